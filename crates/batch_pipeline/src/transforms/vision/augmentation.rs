use crate::pipeline::stage_gen_bool;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use ndarray::{s, Array3};

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Randomly mirrors a `(height, width, channels)` array along the width axis.
///
/// The flip reverses the column stride without copying; consumers iterate in
/// logical order, so the result flattens as a mirrored image.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5)?; // 50% flip chance
/// let augmented = flip.apply(pixels)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { p })
    }

    /// Never flips.
    pub fn disabled() -> Self {
        Self { p: 0.0 }
    }

    fn flip(pixels: Array3<f32>) -> Array3<f32> {
        pixels.slice_move(s![.., ..;-1, ..])
    }
}

impl Transform<Array3<f32>, Array3<f32>> for RandomHorizontalFlip {
    fn apply(&self, pixels: Array3<f32>) -> Result<Array3<f32>> {
        let result = match self.p {
            // Fast path: never flip, no draw from the stage RNG
            0.0 => pixels,
            1.0 => Self::flip(pixels),
            _ => {
                if stage_gen_bool(self.p) {
                    Self::flip(pixels)
                } else {
                    pixels
                }
            }
        };
        Ok(result)
    }
}
