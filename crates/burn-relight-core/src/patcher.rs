//! UNet patcher: collected patches for the host's mutation step
//!
//! The host pipeline owns the live model; this type only accumulates what
//! should change. Cloning is cheap (forward patches are shared), so a host
//! can clone the patcher per request and mutate the clone, leaving the
//! original untouched.

use std::sync::Arc;

use burn::prelude::*;

use crate::forward::{ForwardPatch, PatchedUnet, UnetForward};
use crate::weights::{PatchError, StateDict, WeightPatchSet};

/// Ordered forward patches plus weight patches for one UNet.
#[derive(Clone, Default)]
pub struct UnetPatcher<B: Backend> {
    forward_patches: Vec<Arc<dyn ForwardPatch<B>>>,
    weight_patches: WeightPatchSet,
}

impl<B: Backend> UnetPatcher<B> {
    /// Creates an empty patcher
    pub fn new() -> Self {
        Self {
            forward_patches: Vec::new(),
            weight_patches: WeightPatchSet::new(),
        }
    }

    /// Register a forward patch. Registration order is execution order,
    /// first registered outermost.
    pub fn add_forward_patch(&mut self, patch: impl ForwardPatch<B> + 'static) {
        self.forward_patches.push(Arc::new(patch));
    }

    /// Register weight patches, absorbing them into the pending set.
    pub fn add_weight_patches(&mut self, patches: WeightPatchSet) {
        self.weight_patches.extend(patches);
    }

    /// Number of registered forward patches
    pub fn num_forward_patches(&self) -> usize {
        self.forward_patches.len()
    }

    /// The pending weight patches
    pub fn weight_patches(&self) -> &WeightPatchSet {
        &self.weight_patches
    }

    /// Wrap a model with the registered forward patches.
    pub fn wrap<M: UnetForward<B>>(&self, inner: M) -> PatchedUnet<B, M> {
        PatchedUnet::new(inner, self.forward_patches.clone())
    }

    /// Merge the pending weight patches into a model state dict.
    pub fn merge_weights(&self, state: &mut StateDict) -> Result<(), PatchError> {
        self.weight_patches.merge_into(state)
    }
}
