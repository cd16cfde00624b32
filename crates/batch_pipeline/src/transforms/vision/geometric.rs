use crate::error::PipelineError;
use crate::pipeline::stage_gen_range;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use ndarray::{s, Array3};

// ============================================================================
// Crop
// ============================================================================

/// How the crop window is placed inside the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    /// `((width - crop_width) / 2, (height - crop_height) / 2)`, rounded down.
    Center,
    /// Uniform offset in `[0, width - crop_width) x [0, height - crop_height)`.
    Random,
}

/// Extracts a fixed `(crop_height, crop_width)` window from a `(height, width, 3)` array.
///
/// The source must be strictly larger than the window on both axes, otherwise
/// the sample is rejected with `PipelineError::Geometry`.
///
/// # Example
/// ```ignore
/// let crop = Crop::new(224, 224, CropMode::Center)?;
/// let window = crop.apply(pixels)?; // (224, 224, 3)
/// ```
#[derive(Debug, Clone)]
pub struct Crop {
    width: usize,
    height: usize,
    mode: CropMode,
}

impl Crop {
    pub fn new(width: usize, height: usize, mode: CropMode) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "Crop dimensions must be positive (got {}x{})",
            width,
            height
        );
        Ok(Self {
            width,
            height,
            mode,
        })
    }

    /// Returns the `(x, y)` offset of the window for a `source_width x source_height` source.
    pub fn offsets(&self, source_width: usize, source_height: usize) -> Result<(usize, usize)> {
        if source_width <= self.width || source_height <= self.height {
            return Err(PipelineError::Geometry {
                width: source_width,
                height: source_height,
                crop_width: self.width,
                crop_height: self.height,
            }
            .into());
        }

        let (spare_x, spare_y) = (source_width - self.width, source_height - self.height);
        Ok(match self.mode {
            CropMode::Center => (spare_x / 2, spare_y / 2),
            CropMode::Random => (stage_gen_range(0..spare_x), stage_gen_range(0..spare_y)),
        })
    }
}

impl Transform<Array3<f32>, Array3<f32>> for Crop {
    fn apply(&self, pixels: Array3<f32>) -> Result<Array3<f32>> {
        let (height, width, _) = pixels.dim();
        let (x, y) = self.offsets(width, height)?;
        Ok(pixels.slice_move(s![y..y + self.height, x..x + self.width, ..]))
    }
}
