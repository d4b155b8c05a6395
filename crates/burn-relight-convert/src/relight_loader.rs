//! Relighting UNet checkpoint loading
//!
//! Two checkpoint variants exist, distinguished by how much conditioning the
//! UNet consumes. The variant is recoverable from the checkpoint itself: the
//! first input convolution's weight is `[out, in, 3, 3]`, and `in` is the
//! 4 latent channels plus the conditioning channels.

use std::path::Path;

use thiserror::Error;

use burn_relight_core::StateDict;

use crate::loader::{LoadError, SafeTensorFile};

/// Parameter path of the UNet's first input convolution weight.
const CONV_IN_WEIGHT: &str = "input_blocks.0.0.weight";

/// Latent channels of the SD 1.x UNet.
const LATENT_CHANNELS: usize = 4;

/// Relighting model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelightVariant {
    /// Foreground-conditioned: relights a subject from the text prompt.
    /// Conv-in consumes 4 latent + 4 conditioning channels.
    Fc,
    /// Foreground-and-background-conditioned: relights a subject to match a
    /// background. Conv-in consumes 4 latent + 8 conditioning channels.
    Fbc,
}

impl RelightVariant {
    /// Get a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            RelightVariant::Fc => "fc",
            RelightVariant::Fbc => "fbc",
        }
    }

    /// Conventional checkpoint file name for this variant
    pub fn file_name(&self) -> &'static str {
        match self {
            RelightVariant::Fc => "iclight_sd15_fc_unet_ldm.safetensors",
            RelightVariant::Fbc => "iclight_sd15_fbc_unet_ldm.safetensors",
        }
    }

    /// Conditioning channels concatenated into the UNet input
    pub fn conditioning_channels(&self) -> usize {
        match self {
            RelightVariant::Fc => 4,
            RelightVariant::Fbc => 8,
        }
    }

    /// Number of conditioning images the variant expects
    pub fn num_condition_images(&self) -> usize {
        self.conditioning_channels() / LATENT_CHANNELS
    }

    /// Total input channels of the patched conv-in
    pub fn conv_in_channels(&self) -> usize {
        LATENT_CHANNELS + self.conditioning_channels()
    }
}

impl std::fmt::Display for RelightVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A loaded relighting checkpoint
#[derive(Debug, Clone)]
pub struct RelightCheckpoint {
    /// Detected model variant
    pub variant: RelightVariant,
    /// Full state dict, keys unprefixed as stored in the archive
    pub tensors: StateDict,
}

/// Errors that can occur when loading a relighting checkpoint
#[derive(Error, Debug)]
pub enum RelightLoadError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("checkpoint has no {CONV_IN_WEIGHT} tensor; not a relighting UNet")]
    MissingConvIn,

    #[error("unrecognized conv-in input channels {channels}; expected 8 (fc) or 12 (fbc)")]
    UnknownVariant { channels: usize },
}

/// Detects the variant for a conv-in input-channel count
fn variant_for_channels(channels: usize) -> Option<RelightVariant> {
    [RelightVariant::Fc, RelightVariant::Fbc]
        .into_iter()
        .find(|v| v.conv_in_channels() == channels)
}

/// Load a relighting UNet checkpoint, detecting its variant.
///
/// Load failures propagate unmodified; nothing is retried.
pub fn load_relight_unet(path: impl AsRef<Path>) -> Result<RelightCheckpoint, RelightLoadError> {
    let file = SafeTensorFile::open(path.as_ref())?;

    let conv_in_shape = file
        .shape(CONV_IN_WEIGHT)
        .ok_or(RelightLoadError::MissingConvIn)?;
    let channels = conv_in_shape.get(1).copied().unwrap_or(0);
    let variant =
        variant_for_channels(channels).ok_or(RelightLoadError::UnknownVariant { channels })?;

    Ok(RelightCheckpoint {
        variant,
        tensors: file.load_all()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::Dtype;
    use safetensors::tensor::TensorView;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("burn-relight-ckpt-{}-{}", std::process::id(), name))
    }

    fn write_checkpoint(path: &Path, conv_in_channels: usize) {
        let conv_in: Vec<u8> = vec![0.1f32; 16 * conv_in_channels * 9]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let bias: Vec<u8> = vec![0.0f32; 16].iter().flat_map(|v| v.to_le_bytes()).collect();

        let views = vec![
            (
                CONV_IN_WEIGHT.to_string(),
                TensorView::new(Dtype::F32, vec![16, conv_in_channels, 3, 3], &conv_in).unwrap(),
            ),
            (
                "input_blocks.0.0.bias".to_string(),
                TensorView::new(Dtype::F32, vec![16], &bias).unwrap(),
            ),
        ];
        safetensors::serialize_to_file(views, &None, path).unwrap();
    }

    #[test]
    fn test_variant_for_channels() {
        assert_eq!(variant_for_channels(8), Some(RelightVariant::Fc));
        assert_eq!(variant_for_channels(12), Some(RelightVariant::Fbc));
        assert_eq!(variant_for_channels(4), None);
    }

    #[test]
    fn test_variant_properties() {
        assert_eq!(RelightVariant::Fc.num_condition_images(), 1);
        assert_eq!(RelightVariant::Fbc.num_condition_images(), 2);
        assert!(RelightVariant::Fbc.file_name().contains("fbc"));
    }

    #[test]
    fn test_detects_fc_checkpoint() {
        let path = temp_path("fc.safetensors");
        write_checkpoint(&path, 8);

        let checkpoint = load_relight_unet(&path).unwrap();
        assert_eq!(checkpoint.variant, RelightVariant::Fc);
        assert_eq!(checkpoint.tensors.len(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_detects_fbc_checkpoint() {
        let path = temp_path("fbc.safetensors");
        write_checkpoint(&path, 12);

        let checkpoint = load_relight_unet(&path).unwrap();
        assert_eq!(checkpoint.variant, RelightVariant::Fbc);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_plain_sd_unet() {
        let path = temp_path("sd.safetensors");
        write_checkpoint(&path, 4);

        let err = load_relight_unet(&path).unwrap_err();
        assert!(matches!(
            err,
            RelightLoadError::UnknownVariant { channels: 4 }
        ));

        let _ = std::fs::remove_file(&path);
    }
}
