use crate::catalog::MeanImage;
use crate::error::PipelineError;
use crate::transforms::Transform;
use anyhow::Result;
use ndarray::Array3;

// ============================================================================
// SubtractMean
// ============================================================================

/// Converts a decoded sample to `f32` and subtracts the mean image elementwise.
///
/// # Mathematical Operation:
/// ```text
/// output[h, w, c] = f32(input[h, w, c]) - f32(mean[h, w, c])
/// ```
///
/// The sample must have the mean image's exact shape, otherwise
/// `PipelineError::MeanShape` is returned.
#[derive(Debug, Clone)]
pub struct SubtractMean {
    mean: Array3<f32>,
}

impl SubtractMean {
    pub fn new(mean: &MeanImage) -> Self {
        Self {
            mean: mean.pixels().mapv(f32::from),
        }
    }
}

impl Transform<Array3<u8>, Array3<f32>> for SubtractMean {
    fn apply(&self, pixels: Array3<u8>) -> Result<Array3<f32>> {
        if pixels.dim() != self.mean.dim() {
            let (height, width, channels) = pixels.dim();
            let (mean_height, mean_width, _) = self.mean.dim();
            return Err(PipelineError::MeanShape {
                width,
                height,
                channels,
                mean_width,
                mean_height,
            }
            .into());
        }
        Ok(pixels.mapv(f32::from) - &self.mean)
    }
}
