//! Precision handling for patch tensors
//!
//! Checkpoint tensors arrive in whatever dtype they were saved with; before
//! they are handed to the host mutator they are cast to the precision the
//! runtime executes the UNet in.

use burn::tensor::{DType, TensorData};
use half::{bf16, f16};

/// Floating-point precision for patch tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Full 32-bit precision (default)
    #[default]
    F32,
    /// 16-bit half precision
    F16,
    /// 16-bit brain floating point
    Bf16,
}

impl Precision {
    /// Get a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Precision::F32 => "f32",
            Precision::F16 => "f16",
            Precision::Bf16 => "bf16",
        }
    }

    /// The corresponding tensor dtype.
    pub fn dtype(&self) -> DType {
        match self {
            Precision::F32 => DType::F32,
            Precision::F16 => DType::F16,
            Precision::Bf16 => DType::BF16,
        }
    }

    /// Precision for a tensor dtype, if it is a supported float type.
    pub fn from_dtype(dtype: DType) -> Option<Self> {
        match dtype {
            DType::F32 => Some(Precision::F32),
            DType::F16 => Some(Precision::F16),
            DType::BF16 => Some(Precision::Bf16),
            _ => None,
        }
    }

    /// Cast tensor data to this precision. No-op if already matching.
    pub fn cast(&self, data: TensorData) -> TensorData {
        if data.dtype == self.dtype() {
            return data;
        }
        match self {
            Precision::F32 => data.convert::<f32>(),
            Precision::F16 => data.convert::<f16>(),
            Precision::Bf16 => data.convert::<bf16>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_changes_dtype() {
        let data = TensorData::new(vec![0.5f32, -1.0, 2.0], [3]);
        let cast = Precision::F16.cast(data);
        assert_eq!(cast.dtype, DType::F16);
        assert_eq!(cast.shape, vec![3]);
    }

    #[test]
    fn test_cast_is_noop_for_matching_dtype() {
        let data = TensorData::new(vec![1.0f32, 2.0], [2]);
        let cast = Precision::F32.cast(data.clone());
        assert_eq!(cast, data);
    }

    #[test]
    fn test_cast_round_trip_preserves_representable_values() {
        let data = TensorData::new(vec![0.5f32, -0.25, 4.0], [3]);
        let back = Precision::F32.cast(Precision::F16.cast(data));
        assert_eq!(back.to_vec::<f32>().unwrap(), vec![0.5, -0.25, 4.0]);
    }

    #[test]
    fn test_from_dtype() {
        assert_eq!(Precision::from_dtype(DType::BF16), Some(Precision::Bf16));
        assert_eq!(Precision::from_dtype(DType::I32), None);
    }
}
