#![allow(dead_code)]

use anyhow::Result;
use batch_pipeline::pipeline::PipelineConfigBuilder;
use batch_pipeline::{FinishedBatch, PipelineConfig};
use image::{Rgb, RgbImage};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default sample size. Crops used in tests must be strictly smaller.
pub const WIDTH: u32 = 9;
pub const HEIGHT: u32 = 7;

/// Value stored in the blue channel of every pixel of sample `index` of `class_id`.
pub fn identity(class_id: usize, index: usize) -> u8 {
    (20 + class_id * 50 + index * 10) as u8
}

/// Blue channel of the first pixel of column `col`. With a zero mean image this is
/// the `identity` of the sample in that column.
pub fn column_identity(batch: &FinishedBatch, col: usize) -> u8 {
    batch.data[[2, col]] as u8
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A temporary dataset root with `catalog.json`, a zero `mean.json` and one PNG
/// per sample. Pixels encode `(x, y, identity)` in `(R, G, B)`.
pub struct Fixture {
    dir: TempDir,
    locations: Vec<Vec<String>>,
}

impl Fixture {
    /// `counts[c]` samples for class `c`. Train and val list the same samples.
    pub fn new(counts: &[usize]) -> Result<Self> {
        Self::with_size(counts, WIDTH, HEIGHT)
    }

    pub fn with_size(counts: &[usize], width: u32, height: u32) -> Result<Self> {
        init_logging();
        let dir = tempfile::tempdir()?;

        let mut classes = Vec::with_capacity(counts.len());
        let mut locations = Vec::with_capacity(counts.len());
        for (class_id, &count) in counts.iter().enumerate() {
            let class = format!("class_{}", class_id);
            fs::create_dir_all(dir.path().join(&class))?;

            let mut files = Vec::with_capacity(count);
            for index in 0..count {
                let location = format!("{}/{:04}.png", class, index);
                write_sample(&dir.path().join(&location), width, height, identity(class_id, index))?;
                files.push(location);
            }
            classes.push(class);
            locations.push(files);
        }

        let total: usize = counts.iter().sum();
        let catalog = json!({
            "classes": classes,
            "train": locations,
            "val": locations,
            "num_data_train": total,
            "num_data_val": total,
        });
        fs::write(dir.path().join("catalog.json"), catalog.to_string())?;

        let fixture = Self { dir, locations };
        fixture.write_mean(width, height, 0.0)?;
        Ok(fixture)
    }

    /// Rewrites `mean.json` as a constant `value` image.
    pub fn write_mean(&self, width: u32, height: u32, value: f64) -> Result<()> {
        let data = vec![value; (width * height * 3) as usize];
        let mean = json!({
            "height": height,
            "width": width,
            "data": data,
        });
        fs::write(self.root().join("mean.json"), mean.to_string())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Builder pointed at this root.
    pub fn config(&self) -> PipelineConfigBuilder {
        PipelineConfig::builder().root_path(self.root())
    }

    pub fn sample_path(&self, class_id: usize, index: usize) -> PathBuf {
        self.root().join(&self.locations[class_id][index])
    }

    /// Replaces a sample with bytes no decoder accepts.
    pub fn corrupt(&self, class_id: usize, index: usize) -> Result<()> {
        fs::write(self.sample_path(class_id, index), b"this is not an image")?;
        Ok(())
    }

    pub fn remove(&self, class_id: usize, index: usize) -> Result<()> {
        fs::remove_file(self.sample_path(class_id, index))?;
        Ok(())
    }

    /// Overwrites a sample with a valid image of a different size.
    pub fn resize(&self, class_id: usize, index: usize, width: u32, height: u32) -> Result<()> {
        write_sample(
            &self.sample_path(class_id, index),
            width,
            height,
            identity(class_id, index),
        )
    }
}

pub fn write_sample(path: &Path, width: u32, height: u32, identity: u8) -> Result<()> {
    RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, identity])).save(path)?;
    Ok(())
}
