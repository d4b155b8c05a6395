//! Channel-concat conditioning patch
//!
//! The relighting UNet expects its conditioning latent concatenated onto the
//! noisy latent along the channel dimension, for every sample in the batch.

use burn::prelude::*;

use crate::forward::{ForwardPatch, UnetForward};

/// Forward patch that concatenates a conditioning latent into the UNet input.
///
/// The conditioning tensor is `[cond_batch, cond_channels, h, w]`. At call
/// time it is replicated along the batch dimension to match the activation
/// batch (classifier-free guidance runs conditional and unconditional samples
/// in one batch), then concatenated channel-wise before deferring to the
/// wrapped forward.
///
/// The activation batch must be an integer multiple of `cond_batch`; the
/// check is explicit and a violation fails with a descriptive panic rather
/// than a backend shape error deep inside the UNet.
#[derive(Debug, Clone)]
pub struct ConcatConditioning<B: Backend> {
    cond: Tensor<B, 4>,
}

impl<B: Backend> ConcatConditioning<B> {
    /// Create a patch from an encoded conditioning latent.
    pub fn new(cond: Tensor<B, 4>) -> Self {
        Self { cond }
    }

    /// Batch size of the conditioning tensor.
    pub fn cond_batch(&self) -> usize {
        self.cond.dims()[0]
    }

    /// Number of channels the patch appends to the activation.
    pub fn cond_channels(&self) -> usize {
        self.cond.dims()[1]
    }

    /// The conditioning latent.
    pub fn cond(&self) -> &Tensor<B, 4> {
        &self.cond
    }
}

impl<B: Backend> ForwardPatch<B> for ConcatConditioning<B> {
    fn forward(
        &self,
        x: Tensor<B, 4>,
        timesteps: Tensor<B, 1>,
        context: Tensor<B, 3>,
        inner: &dyn UnetForward<B>,
    ) -> Tensor<B, 4> {
        let batch = x.dims()[0];
        let cond_batch = self.cond.dims()[0];

        assert!(
            cond_batch > 0 && batch % cond_batch == 0,
            "conditioning batch {cond_batch} does not divide activation batch {batch}"
        );

        let cond = self.cond.clone().repeat_dim(0, batch / cond_batch);
        let x = Tensor::cat(vec![x, cond], 1);

        inner.forward(x, timesteps, context)
    }
}
