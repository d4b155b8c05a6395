//! burn-relight-core: patch primitives for relighting adapters
//!
//! A relighting UNet ("IC-Light" family) is not a standalone model: it is a
//! set of weight offsets for a pretrained Stable Diffusion UNet plus an extra
//! conditioning latent concatenated into the UNet input. This crate provides
//! the pieces needed to express that as explicit, inspectable patches:
//!
//! - [`ForwardPatch`] / [`PatchedUnet`]: an ordered interceptor chain around
//!   the UNet forward pass, instead of rebinding a live model's forward.
//! - [`WeightPatchSet`]: named replacement/additive tensor patches merged
//!   into a model state dict.
//! - [`UnetPatcher`]: collects both kinds of patches for the host pipeline's
//!   mutation step.
//! - [`RuntimeContext`]: explicit device and precision configuration passed
//!   into every operation that needs it.

pub mod concat;
pub mod context;
pub mod forward;
pub mod patcher;
pub mod precision;
pub mod weights;

pub use concat::ConcatConditioning;
pub use context::RuntimeContext;
pub use forward::{FnUnet, ForwardPatch, PatchedUnet, UnetForward};
pub use patcher::UnetPatcher;
pub use precision::Precision;
pub use weights::{PatchError, StateDict, WeightPatch, WeightPatchSet, prefixes};
