//! src/transforms/mod.rs
//!
//! Per-sample preprocessing applied by the pipeline stages.
//!
//! ```text
//! Loader stage:     PathBuf ──LoadImage──> Array3<u8>
//! Transform stage:  Array3<u8> ──SubtractMean──> Array3<f32> ──Crop──> ──RandomHorizontalFlip──>
//! ```

pub mod core;
pub mod vision;

pub use core::{Chain, Transform};
