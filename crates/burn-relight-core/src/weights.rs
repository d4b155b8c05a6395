//! Weight patches merged into a model state dict
//!
//! A relighting checkpoint is a set of per-parameter tensors keyed by the
//! parameter path inside the UNet. Patches are explicit about their merge
//! semantics: replacement swaps the stored tensor (the relight conv-in grows
//! its input channels this way, so replacement may change a parameter's
//! shape), additive requires matching shapes.

use std::collections::HashMap;

use burn::tensor::TensorData;

use crate::precision::Precision;

/// Root module names used when scoping parameter paths.
pub mod prefixes {
    /// Root of the noise-prediction UNet inside the loaded model.
    pub const DIFFUSION_MODEL: &str = "diffusion_model";
}

/// A model's parameters keyed by parameter path.
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    tensors: HashMap<String, TensorData>,
}

impl StateDict {
    /// Creates an empty state dict
    pub fn new() -> Self {
        Self {
            tensors: HashMap::new(),
        }
    }

    /// Insert a tensor under a parameter path
    pub fn insert(&mut self, name: impl Into<String>, data: TensorData) {
        self.tensors.insert(name.into(), data);
    }

    /// Get a tensor by parameter path
    pub fn get(&self, name: &str) -> Option<&TensorData> {
        self.tensors.get(name)
    }

    /// Check if a parameter path exists
    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Get a tensor's shape
    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.tensors.get(name).map(|t| t.shape.as_slice())
    }

    /// List all parameter paths
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(|s| s.as_str())
    }

    /// Iterate over all parameters
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorData)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl FromIterator<(String, TensorData)> for StateDict {
    fn from_iter<I: IntoIterator<Item = (String, TensorData)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

/// A single parameter patch with explicit merge semantics.
#[derive(Debug, Clone)]
pub enum WeightPatch {
    /// Replace the stored tensor. The shape may differ from the original.
    Replace(TensorData),
    /// Add to the stored tensor elementwise. Shapes must match.
    Add(TensorData),
}

impl WeightPatch {
    /// The patch tensor.
    pub fn data(&self) -> &TensorData {
        match self {
            WeightPatch::Replace(data) | WeightPatch::Add(data) => data,
        }
    }

    fn map(self, f: impl FnOnce(TensorData) -> TensorData) -> Self {
        match self {
            WeightPatch::Replace(data) => WeightPatch::Replace(f(data)),
            WeightPatch::Add(data) => WeightPatch::Add(f(data)),
        }
    }
}

/// A set of weight patches keyed by parameter path.
#[derive(Debug, Clone, Default)]
pub struct WeightPatchSet {
    patches: HashMap<String, WeightPatch>,
}

impl WeightPatchSet {
    /// Creates an empty patch set
    pub fn new() -> Self {
        Self {
            patches: HashMap::new(),
        }
    }

    /// Build a patch set replacing every parameter in `state`.
    pub fn from_replacements(state: StateDict) -> Self {
        Self {
            patches: state
                .tensors
                .into_iter()
                .map(|(name, data)| (name, WeightPatch::Replace(data)))
                .collect(),
        }
    }

    /// Insert a patch under a parameter path
    pub fn insert(&mut self, name: impl Into<String>, patch: WeightPatch) {
        self.patches.insert(name.into(), patch);
    }

    /// Get a patch by parameter path
    pub fn get(&self, name: &str) -> Option<&WeightPatch> {
        self.patches.get(name)
    }

    /// List all patched parameter paths
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patches.keys().map(|s| s.as_str())
    }

    /// Number of patches
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Absorb all patches from another set. Later insertions win on conflict.
    pub fn extend(&mut self, other: WeightPatchSet) {
        self.patches.extend(other.patches);
    }

    /// Scope every key under a root module name.
    ///
    /// `conv_in.weight` becomes `<root>.conv_in.weight`. The prefix is
    /// prepended exactly once per call.
    pub fn prefixed(self, root: &str) -> Self {
        Self {
            patches: self
                .patches
                .into_iter()
                .map(|(name, patch)| (format!("{root}.{name}"), patch))
                .collect(),
        }
    }

    /// Cast every patch tensor to the given precision.
    pub fn cast(self, precision: Precision) -> Self {
        Self {
            patches: self
                .patches
                .into_iter()
                .map(|(name, patch)| (name, patch.map(|data| precision.cast(data))))
                .collect(),
        }
    }

    /// Merge all patches into a state dict.
    ///
    /// Every patched path must already exist in `state`; an unknown path is
    /// an error rather than a silent insert, so a checkpoint aimed at the
    /// wrong architecture fails loudly.
    pub fn merge_into(&self, state: &mut StateDict) -> Result<(), PatchError> {
        for (name, patch) in &self.patches {
            let current = state
                .tensors
                .get(name)
                .ok_or_else(|| PatchError::UnknownParameter(name.clone()))?;

            let merged = match patch {
                WeightPatch::Replace(data) => data.clone(),
                WeightPatch::Add(delta) => add_tensors(name, current, delta)?,
            };
            state.tensors.insert(name.clone(), merged);
        }
        Ok(())
    }
}

/// Elementwise sum preserving the base tensor's dtype.
fn add_tensors(name: &str, base: &TensorData, delta: &TensorData) -> Result<TensorData, PatchError> {
    if base.shape != delta.shape {
        return Err(PatchError::ShapeMismatch {
            name: name.to_string(),
            expected: base.shape.clone(),
            actual: delta.shape.clone(),
        });
    }

    let precision = Precision::from_dtype(base.dtype)
        .ok_or_else(|| PatchError::UnsupportedDtype(name.to_string()))?;

    let lhs = base
        .clone()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PatchError::Data(format!("{e:?}")))?;
    let rhs = delta
        .clone()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PatchError::Data(format!("{e:?}")))?;

    let sum: Vec<f32> = lhs.iter().zip(rhs.iter()).map(|(a, b)| a + b).collect();
    Ok(precision.cast(TensorData::new(sum, base.shape.clone())))
}

/// Errors that can occur when merging weight patches
#[derive(Debug)]
pub enum PatchError {
    /// Patched path does not exist in the target state dict
    UnknownParameter(String),
    /// Additive patch shape does not match the base parameter
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// Base parameter is not a supported float dtype
    UnsupportedDtype(String),
    /// Tensor data could not be read
    Data(String),
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownParameter(name) => write!(f, "unknown parameter: {}", name),
            Self::ShapeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "shape mismatch for {}: expected {:?}, got {:?}",
                name, expected, actual
            ),
            Self::UnsupportedDtype(name) => write!(f, "unsupported dtype for {}", name),
            Self::Data(msg) => write!(f, "tensor data error: {}", msg),
        }
    }
}

impl std::error::Error for PatchError {}
