//! src/pipeline/config.rs
//!
//! Configuration for pipeline behaviour
//!
//! `PipelineConfig` enumerates every recognized option and is fixed once the
//! pipeline is built. It can be assembled with the builder or read from JSON.
//!
//! Example:
//! ```ignore
//! let config = PipelineConfig::builder()
//!     .root_path("/big/nn-data/imagenet")
//!     .batch_size(128)
//!     .crop(224, 224)
//!     .buffer_size(2)
//!     .random_transform(true)
//!     .data_mode(DataMode::Train)
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `buffer_size`: capacity of both bounded queues. Larger values absorb decode
//!                  jitter but hold `2 x buffer_size` batches in memory.
//! - `batch_size`: every batch is exactly this size, so memory per batch is
//!                 `crop_width * crop_height * 3 * batch_size * 4` bytes once finished.

use crate::catalog::DataMode;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const CATALOG_FILE_NAME: &str = "catalog.json";
const MEAN_FILE_NAME: &str = "mean.json";

/// Position to resume from. The next batch produced is
/// `(epoch_index, batch_index + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResumePoint {
    /// 1-based epoch.
    pub epoch_index: usize,
    /// Number of batches of `epoch_index` already consumed.
    pub batch_index: usize,
}

/// Configuration for a `Pipeline`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory sample locations are resolved against
    pub root_path: PathBuf,
    /// Catalog JSON (defaults to `<root_path>/catalog.json`)
    pub catalog_path: Option<PathBuf>,
    /// Mean source (defaults to `<root_path>/mean.json`)
    pub mean_path: Option<PathBuf>,
    /// Number of samples per batch. There are no partial batches.
    pub batch_size: usize,
    pub crop_width: usize,
    pub crop_height: usize,
    /// Capacity of the raw queue and of the finished queue
    pub buffer_size: usize,
    /// Random crop offsets and horizontal mirroring instead of a centered crop
    pub random_transform: bool,
    pub data_mode: DataMode,
    pub resume: Option<ResumePoint>,
    /// Seed for the train sampler and the augmentation RNG.
    /// Drawn from OS entropy when absent.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            catalog_path: None,
            mean_path: None,
            batch_size: 128,
            crop_width: 224,
            crop_height: 224,
            buffer_size: 2,
            random_transform: false,
            data_mode: DataMode::Train,
            resume: None,
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Reads a configuration from a JSON file. Missing keys take their defaults,
    /// unknown keys are rejected.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PipelineError::config(format!("cannot open config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            PipelineError::config(format!("malformed config {}: {}", path.display(), e))
        })?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    pub fn catalog_source(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.root_path.join(CATALOG_FILE_NAME))
    }

    pub fn mean_source(&self) -> PathBuf {
        self.mean_path
            .clone()
            .unwrap_or_else(|| self.root_path.join(MEAN_FILE_NAME))
    }

    /// Checks the values that do not depend on the catalog.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be greater than 0").into());
        }
        if self.buffer_size == 0 {
            return Err(PipelineError::config(
                "buffer_size must be greater than 0, a zero-capacity queue would serialize the stages",
            )
            .into());
        }
        if self.crop_width == 0 || self.crop_height == 0 {
            return Err(PipelineError::config(format!(
                "crop dimensions must be positive (got {}x{})",
                self.crop_width, self.crop_height
            ))
            .into());
        }
        if let Some(resume) = self.resume {
            if resume.epoch_index == 0 {
                return Err(PipelineError::config("resume epoch_index is 1-based, got 0").into());
            }
        }
        Ok(())
    }
}

/// Builder for PipelineConfig with method chaining
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn root_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root_path = root.into();
        self
    }

    pub fn catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.catalog_path = Some(path.into());
        self
    }

    pub fn mean_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mean_path = Some(path.into());
        self
    }

    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the crop width and height
    pub fn crop(mut self, width: usize, height: usize) -> Self {
        self.config.crop_width = width;
        self.config.crop_height = height;
        self
    }

    /// Set the capacity of both queues (must be > 0)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn random_transform(mut self, enabled: bool) -> Self {
        self.config.random_transform = enabled;
        self
    }

    pub fn data_mode(mut self, mode: DataMode) -> Self {
        self.config.data_mode = mode;
        self
    }

    /// Resume after `batch_index` batches of `epoch_index`
    pub fn resume(mut self, epoch_index: usize, batch_index: usize) -> Self {
        self.config.resume = Some(ResumePoint {
            epoch_index,
            batch_index,
        });
        self
    }

    /// Set the random seed for reproducible sampling and augmentation.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
