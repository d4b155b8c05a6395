//! Load tensors from .safetensors files
//!
//! The archive is memory-mapped and tensors are decoded on demand. Decoding
//! goes through byte-wise reads because mmap data carries no alignment
//! guarantees.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use burn::tensor::TensorData;
use burn_relight_core::StateDict;
use half::{bf16, f16};
use memmap2::MmapOptions;
use safetensors::{Dtype, SafeTensors};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    #[error("Tensor not found: {0}")]
    TensorNotFound(String),

    #[error("Unsupported dtype: {0:?}")]
    UnsupportedDtype(Dtype),
}

/// A loaded safetensors file with memory-mapped data
#[derive(Debug)]
pub struct SafeTensorFile {
    mmap: memmap2::Mmap,
    // Tensor metadata (name -> (dtype, shape, byte range))
    tensors: HashMap<String, TensorInfo>,
}

#[derive(Debug)]
struct TensorInfo {
    dtype: Dtype,
    shape: Vec<usize>,
    start: usize,
    end: usize,
}

impl SafeTensorFile {
    /// Open a safetensors file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        // Parse the safetensors header to get tensor metadata
        let st = SafeTensors::deserialize(&mmap)?;

        let mut tensors = HashMap::new();
        for (name, view) in st.tensors() {
            let start = view.data().as_ptr() as usize - mmap.as_ptr() as usize;
            tensors.insert(
                name.to_string(),
                TensorInfo {
                    dtype: view.dtype(),
                    shape: view.shape().to_vec(),
                    start,
                    end: start + view.data().len(),
                },
            );
        }

        Ok(Self { mmap, tensors })
    }

    /// List all tensor names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(|s| s.as_str())
    }

    /// Check if a tensor exists
    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Get tensor shape
    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.tensors.get(name).map(|t| t.shape.as_slice())
    }

    /// Get tensor dtype
    pub fn dtype(&self, name: &str) -> Option<Dtype> {
        self.tensors.get(name).map(|t| t.dtype)
    }

    /// Number of tensors in the archive
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Check if the archive holds no tensors
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Decode a tensor as dynamic-rank data, preserving its stored dtype.
    ///
    /// A full UNet state dict mixes ranks 1 through 4, so the rank lives in
    /// the returned shape rather than in the call site's type.
    pub fn load_data(&self, name: &str) -> Result<TensorData, LoadError> {
        let info = self
            .tensors
            .get(name)
            .ok_or_else(|| LoadError::TensorNotFound(name.to_string()))?;

        let bytes = &self.mmap[info.start..info.end];
        let shape = info.shape.clone();

        let data = match info.dtype {
            Dtype::F32 => {
                let values: Vec<f32> = bytes
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                TensorData::new(values, shape)
            }
            Dtype::F16 => {
                let values: Vec<f16> = bytes
                    .chunks_exact(2)
                    .map(|chunk| f16::from_bits(u16::from_le_bytes([chunk[0], chunk[1]])))
                    .collect();
                TensorData::new(values, shape)
            }
            Dtype::BF16 => {
                let values: Vec<bf16> = bytes
                    .chunks_exact(2)
                    .map(|chunk| bf16::from_bits(u16::from_le_bytes([chunk[0], chunk[1]])))
                    .collect();
                TensorData::new(values, shape)
            }
            dtype => return Err(LoadError::UnsupportedDtype(dtype)),
        };

        Ok(data)
    }

    /// Decode every tensor in the archive into a state dict.
    pub fn load_all(&self) -> Result<StateDict, LoadError> {
        let mut state = StateDict::new();
        for name in self.tensors.keys() {
            state.insert(name.clone(), self.load_data(name)?);
        }
        Ok(state)
    }
}
