use crate::batch::RawSample;
use crate::error::PipelineError;
use crate::transforms::Transform;
use anyhow::Result;
use image::{ImageReader, RgbImage};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

// ============================================================================
// LoadImage - Base image loader
// ============================================================================

/// Loads an image file and decodes it to a `(height, width, 3)` byte array.
///
/// The format is guessed from the file contents, not the extension. Grayscale and
/// alpha sources are converted to RGB, with a single channel replicated three times.
/// Any read or decode failure is a `PipelineError::Decode`.
///
/// # Example
/// ```ignore
/// let pixels = LoadImage::new().apply(PathBuf::from("n01440764/0001.JPEG"))?;
/// assert_eq!(pixels.dim().2, 3);
/// ```
#[derive(Debug, Clone)]
pub struct LoadImage {
    buffer_size: usize,
}

impl Default for LoadImage {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadImage {
    /// Creates a new image loader with an 8KB read buffer.
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }

    fn read_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len() as usize;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn decode(path: &Path, bytes: Vec<u8>) -> Result<RgbImage, PipelineError> {
        let decode_error = |reason: String| PipelineError::Decode {
            path: path.to_path_buf(),
            reason,
        };
        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| decode_error(e.to_string()))?
            .decode()
            .map_err(|e| decode_error(e.to_string()))?;
        Ok(image.to_rgb8())
    }
}

/// Converts an interleaved RGB buffer into `(height, width, 3)`.
pub fn rgb_to_array(image: RgbImage) -> Result<Array3<u8>> {
    let (width, height) = image.dimensions();
    let pixels = Array3::from_shape_vec((height as usize, width as usize, 3), image.into_raw())?;
    Ok(pixels)
}

impl Transform<PathBuf, Array3<u8>> for LoadImage {
    fn apply(&self, path: PathBuf) -> Result<Array3<u8>> {
        let bytes = self.read_bytes(&path).map_err(|e| PipelineError::Decode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let image = Self::decode(&path, bytes)?;
        rgb_to_array(image)
    }
}

// ============================================================================
// LoadSample
// ============================================================================

/// Loads a labelled sample location into a `RawSample`.
#[derive(Debug, Clone, Default)]
pub struct LoadSample {
    image_loader: LoadImage,
}

impl LoadSample {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform<(PathBuf, usize), RawSample> for LoadSample {
    fn apply(&self, (path, label): (PathBuf, usize)) -> Result<RawSample> {
        let pixels = self.image_loader.apply(path)?;
        Ok(RawSample { label, pixels })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};
    use tempfile::tempdir;

    #[test]
    fn test_load_rgb_png() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("rgb.png");
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([10, 20, 30]));
        img.save(&path)?;

        let pixels = LoadImage::new().apply(path)?;
        assert_eq!(pixels.dim(), (2, 3, 3));
        assert_eq!(
            [pixels[[1, 2, 0]], pixels[[1, 2, 1]], pixels[[1, 2, 2]]],
            [10, 20, 30]
        );
        Ok(())
    }

    #[test]
    fn test_grayscale_is_replicated() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("gray.png");
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(1, 0, Luma([77]));
        img.save(&path)?;

        let sample = LoadSample::new().apply((path, 4))?;
        assert_eq!(sample.label, 4);
        assert_eq!(sample.pixels.dim(), (2, 2, 3));
        assert!((0..3).all(|c| sample.pixels[[0, 1, c]] == 77));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = LoadImage::new()
            .apply(PathBuf::from("/nonexistent/sample.png"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Decode { .. })
        ));
    }

    #[test]
    fn test_corrupt_file_is_decode_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("corrupt.png");
        std::fs::write(&path, b"definitely not an image")?;

        let err = LoadImage::new().apply(path.clone()).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Decode { path: failed, .. }) => assert_eq!(failed, &path),
            other => panic!("expected decode error, got {:?}", other),
        }
        Ok(())
    }
}
