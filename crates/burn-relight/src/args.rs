//! Per-request relighting arguments

use std::path::{Path, PathBuf};

use image::RgbImage;

use burn_relight_convert::RelightVariant;

/// Arguments for one relighting request.
///
/// The subject image is both the conditioning source and the auxiliary
/// result image some hosts display next to the generated output. The
/// background image is only consumed by the [`RelightVariant::Fbc`] variant.
#[derive(Debug, Clone)]
pub struct RelightArgs {
    /// Path to the relight UNet checkpoint
    pub checkpoint: PathBuf,
    /// Selected model variant; cross-checked against the checkpoint
    pub variant: RelightVariant,
    /// Subject image to relight
    pub subject: RgbImage,
    /// Background the subject is lit to match (fbc only)
    pub background: Option<RgbImage>,
}

impl RelightArgs {
    /// Arguments for the foreground-conditioned variant
    pub fn fc(checkpoint: impl AsRef<Path>, subject: RgbImage) -> Self {
        Self {
            checkpoint: checkpoint.as_ref().to_path_buf(),
            variant: RelightVariant::Fc,
            subject,
            background: None,
        }
    }

    /// Arguments for the background-conditioned variant
    pub fn fbc(checkpoint: impl AsRef<Path>, subject: RgbImage, background: RgbImage) -> Self {
        Self {
            checkpoint: checkpoint.as_ref().to_path_buf(),
            variant: RelightVariant::Fbc,
            subject,
            background: Some(background),
        }
    }

    /// The input RGB image for this request
    pub fn input_rgb(&self) -> &RgbImage {
        &self.subject
    }
}
