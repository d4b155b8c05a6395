//! Explicit runtime configuration
//!
//! Device and precision are passed into every operation that needs them
//! instead of being read from process-wide state.

use burn::prelude::*;

use crate::precision::Precision;

/// Device and precision configuration for one generation request.
///
/// The UNet and the first-stage encoder commonly run at different
/// precisions, so the two are configured separately. Precision applies to
/// patch tensor data; live activations follow the backend's float element
/// type.
#[derive(Debug, Clone)]
pub struct RuntimeContext<B: Backend> {
    /// Device all patch tensors are placed on.
    pub device: B::Device,
    /// Precision for UNet weight patches.
    pub unet_precision: Precision,
    /// Precision for tensors fed through the first-stage encoder.
    pub vae_precision: Precision,
}

impl<B: Backend> RuntimeContext<B> {
    /// Full-precision context on the given device.
    pub fn new(device: B::Device) -> Self {
        Self {
            device,
            unet_precision: Precision::default(),
            vae_precision: Precision::default(),
        }
    }

    /// Set the UNet weight precision
    pub fn with_unet_precision(mut self, precision: Precision) -> Self {
        self.unet_precision = precision;
        self
    }

    /// Set the encoder precision
    pub fn with_vae_precision(mut self, precision: Precision) -> Self {
        self.vae_precision = precision;
        self
    }
}
