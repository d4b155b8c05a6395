//! burn-relight-convert: checkpoint loading for relighting UNets
//!
//! Relighting checkpoints are single safetensors archives mapping LDM-style
//! parameter paths (`input_blocks.0.0.weight`, ...) to tensors. This crate
//! memory-maps the archive, extracts tensors as dynamic-rank data, and
//! auto-detects which relight variant a checkpoint is.

pub mod loader;
pub mod relight_loader;

pub use loader::{LoadError, SafeTensorFile};
pub use relight_loader::{RelightCheckpoint, RelightLoadError, RelightVariant, load_relight_unet};
