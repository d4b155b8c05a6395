//! Forward interception for the patched UNet
//!
//! Patches are explicit interceptors around the UNet forward pass: each one
//! receives the inputs plus a handle to the rest of the chain, may rewrite
//! the inputs, and must defer to the chain for the actual computation. The
//! executor walks the patches in registration order (first registered is
//! outermost), ending at the unpatched model.

use burn::prelude::*;
use std::sync::Arc;

/// The SD 1.x UNet forward signature.
///
/// Every patch and every patched model conforms to this one signature, so
/// patches compose regardless of what they wrap.
pub trait UnetForward<B: Backend> {
    /// Predict noise for a batch of latents.
    ///
    /// * `x` - Noisy latent [batch, channels, h, w]
    /// * `timesteps` - Timestep for each sample [batch]
    /// * `context` - Text embeddings [batch, seq_len, context_dim]
    fn forward(
        &self,
        x: Tensor<B, 4>,
        timesteps: Tensor<B, 1>,
        context: Tensor<B, 3>,
    ) -> Tensor<B, 4>;
}

/// Adapter implementing [`UnetForward`] for a plain function or closure.
pub struct FnUnet<F>(pub F);

impl<B, F> UnetForward<B> for FnUnet<F>
where
    B: Backend,
    F: Fn(Tensor<B, 4>, Tensor<B, 1>, Tensor<B, 3>) -> Tensor<B, 4>,
{
    fn forward(
        &self,
        x: Tensor<B, 4>,
        timesteps: Tensor<B, 1>,
        context: Tensor<B, 3>,
    ) -> Tensor<B, 4> {
        (self.0)(x, timesteps, context)
    }
}

/// An interceptor around a [`UnetForward`].
///
/// Implementations augment the inputs and defer to `inner`; they must not
/// change the signature or skip the deferred call.
pub trait ForwardPatch<B: Backend> {
    /// Run the patch, deferring to `inner` for the wrapped computation.
    fn forward(
        &self,
        x: Tensor<B, 4>,
        timesteps: Tensor<B, 1>,
        context: Tensor<B, 3>,
        inner: &dyn UnetForward<B>,
    ) -> Tensor<B, 4>;
}

/// A model wrapped with an ordered list of forward patches.
///
/// Calling [`UnetForward::forward`] runs the patches in registration order,
/// with the first registered patch outermost and the unpatched model
/// innermost.
pub struct PatchedUnet<B: Backend, M: UnetForward<B>> {
    inner: M,
    patches: Vec<Arc<dyn ForwardPatch<B>>>,
}

impl<B: Backend, M: UnetForward<B>> PatchedUnet<B, M> {
    /// Wrap a model with an ordered patch list.
    pub fn new(inner: M, patches: Vec<Arc<dyn ForwardPatch<B>>>) -> Self {
        Self { inner, patches }
    }

    /// Number of patches in the chain.
    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    /// Unwrap, returning the inner model.
    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<B: Backend, M: UnetForward<B>> UnetForward<B> for PatchedUnet<B, M> {
    fn forward(
        &self,
        x: Tensor<B, 4>,
        timesteps: Tensor<B, 1>,
        context: Tensor<B, 3>,
    ) -> Tensor<B, 4> {
        let chain = Chain {
            patches: &self.patches,
            inner: &self.inner,
        };
        chain.forward(x, timesteps, context)
    }
}

/// Tail of the patch chain: the remaining patches plus the innermost model.
struct Chain<'a, B: Backend> {
    patches: &'a [Arc<dyn ForwardPatch<B>>],
    inner: &'a dyn UnetForward<B>,
}

impl<B: Backend> UnetForward<B> for Chain<'_, B> {
    fn forward(
        &self,
        x: Tensor<B, 4>,
        timesteps: Tensor<B, 1>,
        context: Tensor<B, 3>,
    ) -> Tensor<B, 4> {
        match self.patches.split_first() {
            Some((head, rest)) => {
                let next = Chain {
                    patches: rest,
                    inner: self.inner,
                };
                head.forward(x, timesteps, context, &next)
            }
            None => self.inner.forward(x, timesteps, context),
        }
    }
}
