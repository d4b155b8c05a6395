//! Conditioning image to pixel tensor conversion
//!
//! Pure functions: an RGB image in, a `[batch, 3, h, w]` float tensor out.
//! Hosts disagree on pixel value range, so both conventions are provided.

use burn::prelude::*;
use burn::tensor::TensorData;
use image::RgbImage;
use thiserror::Error;

use burn_relight_convert::RelightVariant;

/// Pixel value range convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRange {
    /// Values in [0, 1]
    Unit,
    /// Values in [-1, 1]
    Signed,
}

/// Errors in conditioning construction
#[derive(Error, Debug)]
pub enum ConditioningError {
    #[error("the {0} variant requires a background image")]
    MissingBackground(RelightVariant),

    #[error("subject is {subject_w}x{subject_h} but background is {background_w}x{background_h}")]
    SizeMismatch {
        subject_w: u32,
        subject_h: u32,
        background_w: u32,
        background_h: u32,
    },
}

/// Convert an RGB image to a `[1, 3, h, w]` float tensor in the given range.
pub fn rgb_to_tensor<B: Backend>(
    image: &RgbImage,
    range: ValueRange,
    device: &B::Device,
) -> Tensor<B, 4> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut values = vec![0.0f32; 3 * h * w];
    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let unit = pixel.0[c] as f32 / 255.0;
            values[c * h * w + y * w + x] = match range {
                ValueRange::Unit => unit,
                ValueRange::Signed => unit * 2.0 - 1.0,
            };
        }
    }

    Tensor::from_data(TensorData::new(values, [1, 3, h, w]), device)
}

/// Build the concatenation source for a request.
///
/// `Fc` conditions on the subject alone: `[1, 3, h, w]`. `Fbc` stacks the
/// subject and background batch-wise: `[2, 3, h, w]`, encoded per sample and
/// folded into the channel dimension downstream.
pub fn concat_source<B: Backend>(
    subject: &RgbImage,
    background: Option<&RgbImage>,
    variant: RelightVariant,
    range: ValueRange,
    device: &B::Device,
) -> Result<Tensor<B, 4>, ConditioningError> {
    match variant {
        RelightVariant::Fc => Ok(rgb_to_tensor(subject, range, device)),
        RelightVariant::Fbc => {
            let background =
                background.ok_or(ConditioningError::MissingBackground(variant))?;
            if subject.dimensions() != background.dimensions() {
                let (subject_w, subject_h) = subject.dimensions();
                let (background_w, background_h) = background.dimensions();
                return Err(ConditioningError::SizeMismatch {
                    subject_w,
                    subject_h,
                    background_w,
                    background_h,
                });
            }
            Ok(Tensor::cat(
                vec![
                    rgb_to_tensor(subject, range, device),
                    rgb_to_tensor(background, range, device),
                ],
                0,
            ))
        }
    }
}
