//! First-stage encoding glue
//!
//! The host owns the VAE; this module owns the seam to it and the tensor
//! plumbing around it. Conditioning is re-encoded on every request, never
//! cached.

use burn::prelude::*;

/// Memory layout of a pixel tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// `[batch, channels, height, width]`
    #[default]
    Nchw,
    /// `[batch, height, width, channels]`
    Nhwc,
}

/// The host pipeline's image-to-latent encoder.
pub trait FirstStageEncoder<B: Backend> {
    /// Encode pixels into the UNet's 4-channel latent space.
    ///
    /// Pixels arrive in the format declared by [`pixel_format`], spatial
    /// dimensions a multiple of the encoder's downsampling factor.
    ///
    /// [`pixel_format`]: FirstStageEncoder::pixel_format
    fn encode(&self, pixels: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Pixel layout this encoder consumes. NCHW unless the host says
    /// otherwise.
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Nchw
    }
}

/// Reorder an NCHW pixel tensor into the requested format.
pub fn to_pixel_format<B: Backend>(pixels: Tensor<B, 4>, format: PixelFormat) -> Tensor<B, 4> {
    match format {
        PixelFormat::Nchw => pixels,
        PixelFormat::Nhwc => pixels.permute([0, 2, 3, 1]),
    }
}

/// Encode NCHW pixels through the host encoder, honoring its declared
/// pixel format.
pub fn encode_conditioning<B: Backend>(
    encoder: &dyn FirstStageEncoder<B>,
    pixels: Tensor<B, 4>,
) -> Tensor<B, 4> {
    encoder.encode(to_pixel_format(pixels, encoder.pixel_format()))
}

/// Fold per-sample latents into the channel dimension.
///
/// `[b, c, h, w]` becomes `[1, b * c, h, w]` with sample 0's channels first.
/// Hosts that patch conditioning as a single block consume this layout.
pub fn pack_per_sample<B: Backend>(latent: Tensor<B, 4>) -> Tensor<B, 4> {
    let [b, c, h, w] = latent.dims();
    latent.reshape([1, b * c, h, w])
}
