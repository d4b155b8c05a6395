//! End-to-end adapter tests against a generated checkpoint fixture.

use burn::prelude::*;
use burn_ndarray::NdArray;
use image::{Rgb, RgbImage};
use safetensors::Dtype;
use safetensors::tensor::TensorView;
use std::path::{Path, PathBuf};

use burn_relight::{
    FirstStageEncoder, PipelineContext, PixelFormat, RelightArgs, RelightError, RelightVariant,
    RuntimeContext, apply_packed, apply_spatial, encode_conditioning,
};
use burn_relight_core::{FnUnet, StateDict, UnetForward};

type TestBackend = NdArray;
type Device = <TestBackend as Backend>::Device;

/// Deterministic stand-in for the host VAE: 8x spatial reduction into four
/// latent channels, every element the input mean.
struct MeanEncoder;

impl FirstStageEncoder<TestBackend> for MeanEncoder {
    fn encode(&self, pixels: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 4> {
        let [b, _, h, w] = pixels.dims();
        let device = pixels.device();
        let mean: f32 = pixels.mean().into_scalar();
        Tensor::full([b, 4, h / 8, w / 8], mean, &device)
    }
}

/// NHWC-consuming encoder, as the spatial host family provides.
struct NhwcEncoder;

impl FirstStageEncoder<TestBackend> for NhwcEncoder {
    fn encode(&self, pixels: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 4> {
        let [b, h, w, c] = pixels.dims();
        assert_eq!(c, 3, "spatial host encoder expects channels-last pixels");
        let device = pixels.device();
        let mean: f32 = pixels.mean().into_scalar();
        Tensor::full([b, 4, h / 8, w / 8], mean, &device)
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Nhwc
    }
}

fn fixture_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("burn-relight-e2e-{}-{}", std::process::id(), name))
}

/// Write a minimal fc-shaped checkpoint with three tensors.
fn write_fc_checkpoint(path: &Path) -> usize {
    let tensors: Vec<(&str, Vec<usize>, usize)> = vec![
        ("input_blocks.0.0.weight", vec![16, 8, 3, 3], 16 * 8 * 9),
        ("input_blocks.0.0.bias", vec![16], 16),
        ("out.2.weight", vec![4, 4], 16),
    ];
    let bytes: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
        .iter()
        .map(|(name, shape, len)| {
            let data = vec![0.5f32; *len]
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect();
            (name.to_string(), shape.clone(), data)
        })
        .collect();
    let views: Vec<(String, TensorView)> = bytes
        .iter()
        .map(|(name, shape, data)| {
            (
                name.clone(),
                TensorView::new(Dtype::F32, shape.clone(), data).unwrap(),
            )
        })
        .collect();
    safetensors::serialize_to_file(views, &None, path).unwrap();
    tensors.len()
}

fn subject() -> RgbImage {
    RgbImage::from_pixel(512, 512, Rgb([128, 128, 128]))
}

fn packed_context() -> PipelineContext<TestBackend> {
    let device = Device::default();
    PipelineContext::new(RuntimeContext::new(device), Box::new(MeanEncoder))
}

#[test]
fn test_apply_packed_registers_both_patch_kinds() {
    let path = fixture_path("packed.safetensors");
    let num_tensors = write_fc_checkpoint(&path);

    let mut pipeline = packed_context();
    let args = RelightArgs::fc(&path, subject());
    apply_packed(&mut pipeline, &args).unwrap();

    assert_eq!(pipeline.unet().num_forward_patches(), 1);

    let weights = pipeline.unet().weight_patches();
    assert_eq!(weights.len(), num_tensors);
    for name in weights.names() {
        assert!(name.starts_with("diffusion_model."));
        assert_eq!(name.matches("diffusion_model.").count(), 1);
    }
    assert!(weights.get("diffusion_model.input_blocks.0.0.weight").is_some());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_apply_packed_forward_patch_shape_property() {
    let path = fixture_path("forward.safetensors");
    write_fc_checkpoint(&path);

    let mut pipeline = packed_context();
    let args = RelightArgs::fc(&path, subject());
    apply_packed(&mut pipeline, &args).unwrap();

    let device = Device::default();
    // Inner UNet stands in for the patched model: checks the augmented
    // channel count and maps back to latent channels.
    let inner = FnUnet(
        |x: Tensor<TestBackend, 4>,
         _t: Tensor<TestBackend, 1>,
         _c: Tensor<TestBackend, 3>| {
            let [b, c, h, w] = x.dims();
            assert_eq!(c, 8, "4 latent + 4 conditioning channels");
            Tensor::zeros([b, 4, h, w], &x.device())
        },
    );
    let patched = pipeline.unet().wrap(inner);

    for batch in [1usize, 2, 4] {
        let out = patched.forward(
            Tensor::ones([batch, 4, 64, 64], &device),
            Tensor::zeros([batch], &device),
            Tensor::zeros([batch, 2, 8], &device),
        );
        assert_eq!(out.dims(), [batch, 4, 64, 64]);
    }

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_apply_spatial_side_channel_once_per_request() {
    let path = fixture_path("spatial.safetensors");
    write_fc_checkpoint(&path);

    let device = Device::default();
    let mut pipeline =
        PipelineContext::new(RuntimeContext::new(device), Box::new(NhwcEncoder));
    let args = RelightArgs::fc(&path, subject());

    apply_spatial(&mut pipeline, &args).unwrap();
    assert_eq!(pipeline.unet().num_forward_patches(), 1);
    assert_eq!(pipeline.extra_images.len(), 1);
    assert_eq!(pipeline.extra_images[0].dimensions(), (512, 512));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_apply_spatial_skips_side_channel_on_hires_pass() {
    let path = fixture_path("hires.safetensors");
    write_fc_checkpoint(&path);

    let device = Device::default();
    let mut pipeline =
        PipelineContext::new(RuntimeContext::new(device), Box::new(NhwcEncoder));
    pipeline.set_hires_pass(true);
    let args = RelightArgs::fc(&path, subject());

    apply_spatial(&mut pipeline, &args).unwrap();
    assert_eq!(pipeline.unet().num_forward_patches(), 1);
    assert!(pipeline.extra_images.is_empty());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_variant_mismatch_is_rejected() {
    let path = fixture_path("mismatch.safetensors");
    write_fc_checkpoint(&path);

    let mut pipeline = packed_context();
    let args = RelightArgs::fbc(&path, subject(), subject());

    let err = apply_packed(&mut pipeline, &args).unwrap_err();
    assert!(matches!(
        err,
        RelightError::VariantMismatch {
            requested: RelightVariant::Fbc,
            detected: RelightVariant::Fc,
        }
    ));
    assert_eq!(pipeline.unet().num_forward_patches(), 0);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_missing_checkpoint_propagates_as_load_error() {
    let mut pipeline = packed_context();
    let args = RelightArgs::fc(fixture_path("nonexistent.safetensors"), subject());

    let err = apply_packed(&mut pipeline, &args).unwrap_err();
    assert!(matches!(err, RelightError::Load(_)));
}

#[test]
fn test_encoding_is_deterministic() {
    let device = Device::default();
    let pixels: Tensor<TestBackend, 4> = Tensor::ones([1, 3, 64, 64], &device) * 0.25;

    let a = encode_conditioning(&MeanEncoder, pixels.clone());
    let b = encode_conditioning(&MeanEncoder, pixels);

    assert_eq!(
        a.into_data().to_vec::<f32>().unwrap(),
        b.into_data().to_vec::<f32>().unwrap()
    );
}

#[test]
fn test_merged_weights_replace_base_parameters() {
    let path = fixture_path("merge.safetensors");
    write_fc_checkpoint(&path);

    let mut pipeline = packed_context();
    let args = RelightArgs::fc(&path, subject());
    apply_packed(&mut pipeline, &args).unwrap();

    // Base UNet state dict with the 4-channel conv-in the checkpoint widens.
    let mut state = StateDict::new();
    state.insert(
        "diffusion_model.input_blocks.0.0.weight",
        burn::tensor::TensorData::new(vec![0.0f32; 16 * 4 * 9], [16, 4, 3, 3]),
    );
    state.insert(
        "diffusion_model.input_blocks.0.0.bias",
        burn::tensor::TensorData::new(vec![0.0f32; 16], [16]),
    );
    state.insert(
        "diffusion_model.out.2.weight",
        burn::tensor::TensorData::new(vec![0.0f32; 16], [4, 4]),
    );

    pipeline.unet().merge_weights(&mut state).unwrap();

    assert_eq!(
        state.shape("diffusion_model.input_blocks.0.0.weight").unwrap(),
        &[16, 8, 3, 3]
    );
    let bias = state
        .get("diffusion_model.input_blocks.0.0.bias")
        .unwrap()
        .to_vec::<f32>()
        .unwrap();
    assert!(bias.iter().all(|v| (*v - 0.5).abs() < 1e-6));

    let _ = std::fs::remove_file(&path);
}
