use crate::batch::ProcessedSample;
use anyhow::{bail, Result};
use ndarray::Array2;

/// A `Collator` defines how to combine processed samples into the feature matrix
/// and label vector of a batch.
pub trait Collator: Send + Sync {
    /// Returns `(data, labels)`.
    fn collate(&self, samples: &[ProcessedSample]) -> Result<(Array2<f32>, Array2<f32>)>;
}

/// A `Collator` that flattens each sample into one column of the feature matrix.
///
/// Samples must share the same `(height, width, channels)` shape; the flattened
/// order is row-major, so column `i` reads `pixels[[0, 0, 0]], pixels[[0, 0, 1]], ..`.
/// Labels land in a `[1, batch_size]` row vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnCollator;

impl Collator for ColumnCollator {
    fn collate(&self, samples: &[ProcessedSample]) -> Result<(Array2<f32>, Array2<f32>)> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        let reference_shape = samples[0].pixels.dim();
        for (i, sample) in samples.iter().enumerate() {
            if sample.pixels.dim() != reference_shape {
                bail!(
                    "Shape mismatch in sample {}: expected {:?}, got {:?}",
                    i,
                    reference_shape,
                    sample.pixels.dim()
                );
            }
        }

        let rows = samples[0].pixels.len();
        let mut data = Array2::<f32>::zeros((rows, samples.len()));
        let mut labels = Array2::<f32>::zeros((1, samples.len()));

        for (i, sample) in samples.iter().enumerate() {
            // `iter` walks in logical row-major order even for mirrored views
            for (dst, src) in data.column_mut(i).iter_mut().zip(sample.pixels.iter()) {
                *dst = *src;
            }
            labels[[0, i]] = sample.label as f32;
        }

        Ok((data, labels))
    }
}
