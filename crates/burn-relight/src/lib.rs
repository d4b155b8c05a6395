//! burn-relight: relighting adapter for Stable Diffusion pipelines
//!
//! Applies an auxiliary relighting UNet ("IC-Light" family) to a pretrained
//! SD 1.x model at inference time. The adapter does not sample or decode
//! anything itself: it encodes a conditioning image into latent space and
//! registers two patches on the host pipeline's [`UnetPatcher`]:
//!
//! 1. a forward patch concatenating the conditioning latent into every UNet
//!    input activation, and
//! 2. replacement weight patches for the relight checkpoint's parameters,
//!    scoped under the `diffusion_model` root.
//!
//! The host then merges the patches and runs its normal generation loop.
//!
//! # Example
//!
//! ```ignore
//! use burn_relight::{RelightArgs, PipelineContext, apply_packed};
//! use burn_relight_core::RuntimeContext;
//!
//! let runtime = RuntimeContext::new(device);
//! let mut pipeline = PipelineContext::new(runtime, Box::new(vae));
//! let args = RelightArgs::fc("models/unet/iclight_sd15_fc_unet_ldm.safetensors", subject);
//!
//! apply_packed(&mut pipeline, &args)?;
//! let unet = pipeline.unet().wrap(base_unet);
//! ```

pub mod apply;
pub mod args;
pub mod conditioning;
pub mod encode;
pub mod pipeline;

pub use apply::{RelightError, apply_packed, apply_spatial};
pub use args::RelightArgs;
pub use conditioning::{ConditioningError, ValueRange, concat_source, rgb_to_tensor};
pub use encode::{FirstStageEncoder, PixelFormat, encode_conditioning, pack_per_sample};
pub use pipeline::PipelineContext;

pub use burn_relight_core::{
    ConcatConditioning, Precision, RuntimeContext, UnetPatcher, WeightPatchSet, prefixes,
};
pub use burn_relight_convert::{RelightCheckpoint, RelightVariant, load_relight_unet};
