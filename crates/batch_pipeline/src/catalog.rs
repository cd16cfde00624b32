//! src/catalog.rs
//!
//! The immutable inputs of the pipeline: the per-class sample `Catalog` and the
//! precomputed `MeanImage`.
//!
//! Both are loaded once when the pipeline is built and then shared read-only
//! (behind `Arc`) by the loader and transform stages, so neither needs any
//! synchronization.
//!
//! # Catalog file
//! ```text
//! {
//!   "classes": ["n01440764", "n01443537"],
//!   "train":   [["n01440764/a.JPEG", ...], [...]],   // indexed by class id
//!   "val":     [[...], [...]],
//!   "num_data_train": 1234,
//!   "num_data_val": 100
//! }
//! ```
//!
//! # Mean source
//! Either JSON `{"height": H, "width": W, "data": [...]}` in row-major
//! height/width/channel order, or any image file the `image` crate decodes.

use crate::error::PipelineError;
use crate::transforms::vision::rgb_to_array;
use anyhow::{Context, Result};
use image::ImageReader;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Which split of the catalog a pipeline reads, and with it the sampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// i.i.d. random draws with replacement at both class and sample level.
    Train,
    /// Deterministic round-robin over classes.
    Val,
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataMode::Train => write!(f, "train"),
            DataMode::Val => write!(f, "val"),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    classes: Vec<String>,
    train: Vec<Vec<String>>,
    val: Vec<Vec<String>>,
    num_data_train: usize,
    num_data_val: usize,
}

/// Sample locations of one split, indexed by class id.
#[derive(Debug, Clone)]
pub struct CatalogSplit {
    samples: Vec<Vec<String>>,
    total_samples: usize,
}

impl CatalogSplit {
    fn new(name: &str, num_classes: usize, samples: Vec<Vec<String>>, declared: usize) -> Result<Self> {
        if samples.len() != num_classes {
            return Err(PipelineError::config(format!(
                "{} split lists {} classes but the catalog declares {}",
                name,
                samples.len(),
                num_classes
            ))
            .into());
        }

        if let Some(class_id) = samples.iter().position(|list| list.is_empty()) {
            return Err(PipelineError::config(format!(
                "class {} has no samples in the {} split",
                class_id, name
            ))
            .into());
        }

        let counted: usize = samples.iter().map(Vec::len).sum();
        if counted != declared {
            return Err(PipelineError::config(format!(
                "num_data_{} is {} but the {} split lists {} samples",
                name, declared, name, counted
            ))
            .into());
        }

        Ok(Self {
            samples,
            total_samples: counted,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.samples.len()
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Number of samples listed for `class_id`.
    pub fn class_len(&self, class_id: usize) -> usize {
        self.samples.get(class_id).map_or(0, Vec::len)
    }

    pub fn location(&self, class_id: usize, sample_index: usize) -> Option<&str> {
        self.samples
            .get(class_id)
            .and_then(|list| list.get(sample_index))
            .map(String::as_str)
    }

    /// Per-class sample counts, in class id order.
    pub fn class_histogram(&self) -> Vec<usize> {
        self.samples.iter().map(Vec::len).collect()
    }
}

/// Immutable mapping from class id to its ordered sample locations.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    classes: Vec<String>,
    train: CatalogSplit,
    val: CatalogSplit,
}

impl Catalog {
    /// Builds a catalog from in-memory lists. `num_data_*` are taken from the lists.
    pub fn new(
        root: impl Into<PathBuf>,
        classes: Vec<String>,
        train: Vec<Vec<String>>,
        val: Vec<Vec<String>>,
    ) -> Result<Self> {
        let num_train = train.iter().map(Vec::len).sum();
        let num_val = val.iter().map(Vec::len).sum();
        Self::from_file(
            root.into(),
            CatalogFile {
                classes,
                train,
                val,
                num_data_train: num_train,
                num_data_val: num_val,
            },
        )
    }

    /// Reads a catalog JSON file. Sample locations resolve relative to `root`.
    pub fn from_json_file(path: &Path, root: impl Into<PathBuf>) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PipelineError::config(format!("cannot open catalog {}: {}", path.display(), e))
        })?;
        let parsed: CatalogFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            PipelineError::config(format!("malformed catalog {}: {}", path.display(), e))
        })?;

        Self::from_file(root.into(), parsed)
            .with_context(|| format!("Invalid catalog: {}", path.display()))
    }

    fn from_file(root: PathBuf, file: CatalogFile) -> Result<Self> {
        if file.classes.is_empty() {
            return Err(PipelineError::config("catalog lists no classes").into());
        }
        let num_classes = file.classes.len();
        let train = CatalogSplit::new("train", num_classes, file.train, file.num_data_train)?;
        let val = CatalogSplit::new("val", num_classes, file.val, file.num_data_val)?;

        Ok(Self {
            root,
            classes: file.classes,
            train,
            val,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn split(&self, mode: DataMode) -> &CatalogSplit {
        match mode {
            DataMode::Train => &self.train,
            DataMode::Val => &self.val,
        }
    }

    pub fn total_samples(&self, mode: DataMode) -> usize {
        self.split(mode).total_samples()
    }

    /// Resolves a draw to the on-disk location of the sample.
    pub fn resolve(&self, mode: DataMode, class_id: usize, sample_index: usize) -> Result<PathBuf> {
        self.split(mode)
            .location(class_id, sample_index)
            .map(|relative| self.root.join(relative))
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "no sample {} in class {} of the {} split",
                    sample_index, class_id, mode
                ))
                .into()
            })
    }

    pub fn summary(&self, mode: DataMode) -> DataSummary {
        let split = self.split(mode);
        DataSummary {
            mode,
            total_samples: split.total_samples(),
            class_histogram: split.class_histogram(),
        }
    }
}

/// Sample count and class histogram of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSummary {
    pub mode: DataMode,
    pub total_samples: usize,
    pub class_histogram: Vec<usize>,
}

impl fmt::Display for DataSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let smallest = self.class_histogram.iter().min().copied().unwrap_or(0);
        let largest = self.class_histogram.iter().max().copied().unwrap_or(0);
        write!(
            f,
            "{}: {} samples over {} classes (per class: min {}, max {})",
            self.mode,
            self.total_samples,
            self.class_histogram.len(),
            smallest,
            largest
        )
    }
}

// ============================================================================
// MeanImage
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MeanFile {
    height: usize,
    width: usize,
    data: Vec<f64>,
}

/// Per-pixel dataset mean, stored in the same byte range as decoded samples.
///
/// Shape is `(height, width, 3)`.
#[derive(Debug, Clone)]
pub struct MeanImage {
    pixels: Array3<u8>,
}

impl MeanImage {
    /// Rounds each value to the nearest integer and clamps it to `0..=255`.
    pub fn from_values(height: usize, width: usize, values: &[f64]) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(PipelineError::config(format!(
                "mean image must be non-empty (got {}x{})",
                width, height
            ))
            .into());
        }
        let expected = height
            .checked_mul(width)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| {
                PipelineError::config(format!("mean image of {}x{} is too large", width, height))
            })?;
        if values.len() != expected {
            return Err(PipelineError::config(format!(
                "mean image of {}x{}x3 needs {} values, found {}",
                width,
                height,
                expected,
                values.len()
            ))
            .into());
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(PipelineError::config(format!("mean image contains {}", bad)).into());
        }

        let bytes = values
            .iter()
            .map(|&v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        let pixels = Array3::from_shape_vec((height, width, 3), bytes)
            .context("Failed to shape mean image")?;
        Ok(Self { pixels })
    }

    pub fn from_pixels(pixels: Array3<u8>) -> Result<Self> {
        let (height, width, channels) = pixels.dim();
        if height == 0 || width == 0 || channels != 3 {
            return Err(PipelineError::config(format!(
                "mean image must be HxWx3 and non-empty (got {}x{}x{})",
                height, width, channels
            ))
            .into());
        }
        Ok(Self { pixels })
    }

    /// Loads a mean source, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_image_file(path)
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PipelineError::config(format!("cannot open mean source {}: {}", path.display(), e))
        })?;
        let parsed: MeanFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            PipelineError::config(format!("malformed mean source {}: {}", path.display(), e))
        })?;

        Self::from_values(parsed.height, parsed.width, &parsed.data)
            .with_context(|| format!("Invalid mean source: {}", path.display()))
    }

    pub fn from_image_file(path: &Path) -> Result<Self> {
        let image = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| {
                PipelineError::config(format!("cannot open mean source {}: {}", path.display(), e))
            })?
            .decode()
            .map_err(|e| {
                PipelineError::config(format!("cannot decode mean source {}: {}", path.display(), e))
            })?;

        let pixels = rgb_to_array(image.to_rgb8()).context("Failed to shape mean image")?;
        Self::from_pixels(pixels)
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }
}

/// Loads the catalog and mean image a pipeline runs on.
///
/// Any failure is a `PipelineError::Configuration`.
pub fn load(root: &Path, catalog_source: &Path, mean_source: &Path) -> Result<(Catalog, MeanImage)> {
    let catalog = Catalog::from_json_file(catalog_source, root)?;
    let mean = MeanImage::load(mean_source)?;
    Ok((catalog, mean))
}
