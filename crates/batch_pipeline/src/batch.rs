//! src/batch.rs
//!
//! Values handed from stage to stage.
//!
//! ```text
//! Loader ──RawBatch──> Transform ──FinishedBatch──> consumer
//! ```
//!
//! Batches are created by one stage, moved through a queue, and consumed by the
//! next. Every batch holds exactly `batch_size` samples.

use ndarray::{Array2, Array3};

/// A decoded sample at its native size, always `(height, width, 3)`.
/// Grayscale sources have their single channel replicated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub label: usize,
    pub pixels: Array3<u8>,
}

impl RawSample {
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub epoch_index: usize,
    pub batch_index: usize,
    pub samples: Vec<RawSample>,
}

/// A sample after mean subtraction, crop and optional mirroring:
/// `(crop_height, crop_width, 3)` in single precision.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSample {
    pub label: usize,
    pub pixels: Array3<f32>,
}

/// A batch ready for compute.
///
/// - `data`: `[crop_width * crop_height * 3, batch_size]`, one flattened sample
///   per column in row-major `(row, column, channel)` order.
/// - `labels`: `[1, batch_size]`, the class id of each column.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedBatch {
    pub epoch_index: usize,
    pub batch_index: usize,
    pub data: Array2<f32>,
    pub labels: Array2<f32>,
}

impl FinishedBatch {
    /// Number of samples (columns) in the batch.
    pub fn batch_size(&self) -> usize {
        self.data.ncols()
    }

    /// `(epoch_index, batch_index, data, labels)`
    pub fn into_parts(self) -> (usize, usize, Array2<f32>, Array2<f32>) {
        (self.epoch_index, self.batch_index, self.data, self.labels)
    }
}
