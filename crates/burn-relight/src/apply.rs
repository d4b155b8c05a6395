//! Adapter entry points
//!
//! One `apply` per host family, both running the same protocol: load the
//! checkpoint, build the conditioning pixels, encode them, then register one
//! forward patch and the checkpoint's weight patches on the pipeline's UNet
//! patcher. Everything is built fresh per request and owned by the patcher
//! afterwards.

use burn::prelude::*;
use thiserror::Error;

use burn_relight_core::{ConcatConditioning, WeightPatchSet, prefixes};
use burn_relight_convert::{RelightLoadError, RelightVariant, load_relight_unet};

use crate::args::RelightArgs;
use crate::conditioning::{ConditioningError, ValueRange, concat_source};
use crate::encode::{encode_conditioning, pack_per_sample};
use crate::pipeline::PipelineContext;

/// Errors surfaced by the apply entry points.
///
/// All of them are fatal for the request; nothing is retried or translated
/// beyond aggregation here.
#[derive(Error, Debug)]
pub enum RelightError {
    #[error("checkpoint load failed: {0}")]
    Load(#[from] RelightLoadError),

    #[error(transparent)]
    Conditioning(#[from] ConditioningError),

    #[error("checkpoint is a {detected} model but {requested} was requested")]
    VariantMismatch {
        requested: RelightVariant,
        detected: RelightVariant,
    },
}

/// Apply relighting for hosts that patch conditioning as a packed block.
///
/// Pixels are signed-range NCHW; per-sample latents are folded into the
/// channel dimension (`[1, b * 4, h, w]`) before registration, so the
/// forward patch replicates one conditioning block per runtime sample.
pub fn apply_packed<B: Backend>(
    pipeline: &mut PipelineContext<B>,
    args: &RelightArgs,
) -> Result<(), RelightError> {
    let checkpoint = load_checked(args)?;

    let pixels = concat_source::<B>(
        &args.subject,
        args.background.as_ref(),
        args.variant,
        ValueRange::Signed,
        pipeline.device(),
    )?;
    let latent = pack_per_sample(encode_conditioning(pipeline.encoder(), pixels));

    register(pipeline, latent, checkpoint.tensors);
    Ok(())
}

/// Apply relighting for hosts that keep per-sample conditioning layout.
///
/// Pixels are unit-range in the encoder's declared format; latents stay
/// `[b, 4, h, w]`. When the call is not a high-resolution refinement pass,
/// the subject image is appended to the host's auxiliary result images
/// exactly once.
pub fn apply_spatial<B: Backend>(
    pipeline: &mut PipelineContext<B>,
    args: &RelightArgs,
) -> Result<(), RelightError> {
    let checkpoint = load_checked(args)?;

    let pixels = concat_source::<B>(
        &args.subject,
        args.background.as_ref(),
        args.variant,
        ValueRange::Unit,
        pipeline.device(),
    )?;
    let latent = encode_conditioning(pipeline.encoder(), pixels);

    register(pipeline, latent, checkpoint.tensors);

    if !pipeline.is_hires_pass() {
        pipeline.push_extra_image(args.subject.clone());
    }
    Ok(())
}

/// Load the checkpoint and cross-check the requested variant against it.
fn load_checked(
    args: &RelightArgs,
) -> Result<burn_relight_convert::RelightCheckpoint, RelightError> {
    let checkpoint = load_relight_unet(&args.checkpoint)?;
    if checkpoint.variant != args.variant {
        return Err(RelightError::VariantMismatch {
            requested: args.variant,
            detected: checkpoint.variant,
        });
    }
    Ok(checkpoint)
}

/// Register the forward patch and the prefixed, precision-cast weight
/// patches.
fn register<B: Backend>(
    pipeline: &mut PipelineContext<B>,
    latent: Tensor<B, 4>,
    tensors: burn_relight_core::StateDict,
) {
    pipeline.add_forward_patch(ConcatConditioning::new(latent));

    let patches = WeightPatchSet::from_replacements(tensors)
        .cast(pipeline.runtime().unet_precision)
        .prefixed(prefixes::DIFFUSION_MODEL);
    pipeline.add_weight_patches(patches);
}
