//! Pipeline context: the host collaborator surface
//!
//! Everything the adapter needs from the host for one generation request.
//! The host constructs one per request; the adapter mutates the patcher and
//! the auxiliary image list through it. Single caller at a time, so no
//! synchronization.

use burn::prelude::*;
use image::RgbImage;

use burn_relight_core::{ForwardPatch, RuntimeContext, UnetPatcher, WeightPatchSet};

use crate::encode::FirstStageEncoder;

/// Host pipeline state handed to the adapter.
pub struct PipelineContext<B: Backend> {
    runtime: RuntimeContext<B>,
    unet: UnetPatcher<B>,
    encoder: Box<dyn FirstStageEncoder<B>>,
    /// Auxiliary images the host displays next to the generated output.
    pub extra_images: Vec<RgbImage>,
    hires_pass: bool,
}

impl<B: Backend> PipelineContext<B> {
    /// Create a context for one generation request.
    pub fn new(runtime: RuntimeContext<B>, encoder: Box<dyn FirstStageEncoder<B>>) -> Self {
        Self {
            runtime,
            unet: UnetPatcher::new(),
            encoder,
            extra_images: Vec::new(),
            hires_pass: false,
        }
    }

    /// The runtime device/precision configuration
    pub fn runtime(&self) -> &RuntimeContext<B> {
        &self.runtime
    }

    /// Device tensors are placed on
    pub fn device(&self) -> &B::Device {
        &self.runtime.device
    }

    /// The first-stage encoder
    pub fn encoder(&self) -> &dyn FirstStageEncoder<B> {
        self.encoder.as_ref()
    }

    /// The UNet patcher accumulating this request's patches
    pub fn unet(&self) -> &UnetPatcher<B> {
        &self.unet
    }

    /// Register a forward patch on the UNet
    pub fn add_forward_patch(&mut self, patch: impl ForwardPatch<B> + 'static) {
        self.unet.add_forward_patch(patch);
    }

    /// Register weight patches on the UNet
    pub fn add_weight_patches(&mut self, patches: WeightPatchSet) {
        self.unet.add_weight_patches(patches);
    }

    /// Append an auxiliary result image
    pub fn push_extra_image(&mut self, image: RgbImage) {
        self.extra_images.push(image);
    }

    /// Whether this call is a secondary high-resolution refinement pass
    pub fn is_hires_pass(&self) -> bool {
        self.hires_pass
    }

    /// Mark this call as a high-resolution refinement pass
    pub fn set_hires_pass(&mut self, hires: bool) {
        self.hires_pass = hires;
    }
}
