//! src/pipeline/controller.rs
//!
//! `Pipeline` owns both stages and both queues and is the only surface a
//! consumer sees.
//!
//! All methods take `&self`, so one thread may block in `get_next_batch()` while
//! another calls `stop()`.

use super::config::PipelineConfig;
use super::queue::{pop, Closed, FailureSlot, StopSignal};
use super::stages::{spawn_stage, LoaderStage, TransformStage, LOADER, TRANSFORM};
use crate::batch::{FinishedBatch, RawBatch};
use crate::catalog::{self, Catalog, DataSummary, MeanImage};
use crate::collator::ColumnCollator;
use crate::error::PipelineError;
use crate::sampler::{sampler_for, BatchSampler, Sampler};
use crate::transforms::vision::{Crop, CropMode, RandomHorizontalFlip, SubtractMean};
use crate::transforms::Transform;
use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use log::{debug, info, warn};
use ndarray::Array3;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Probability of mirroring a sample when `random_transform` is on.
const FLIP_PROBABILITY: f64 = 0.5;

/// Handles of a started pipeline.
struct Running {
    raw_rx: Receiver<RawBatch>,
    finished_rx: Receiver<FinishedBatch>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

/// A continuously running two-stage batch pipeline.
///
/// ```text
/// new() ──> start() ──> get_next_batch()* ──> stop()
/// ```
///
/// Batches are produced indefinitely; epochs are only tags on the batches.
/// Dropping a started pipeline runs `stop()`.
pub struct Pipeline {
    config: PipelineConfig,
    catalog: Arc<Catalog>,
    mean: Arc<MeanImage>,
    summary: DataSummary,
    seed: u64,
    num_batches: usize,
    /// Moved into the loader thread by `start()`.
    sampler: Mutex<Option<BatchSampler<Box<dyn Sampler>>>>,
    running: Mutex<Option<Running>>,
    stop: StopSignal,
    failure: FailureSlot,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Pipeline {
    /// Validates `config`, loads the catalog and mean image, and positions the
    /// sampler at the resume point if one is given. No thread is started.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let (catalog, mean) = catalog::load(
            &config.root_path,
            &config.catalog_source(),
            &config.mean_source(),
        )
        .context("Failed to load pipeline inputs")?;

        let mode = config.data_mode;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let split = catalog.split(mode);
        let mut sampler = BatchSampler::new(
            sampler_for(mode, split, seed),
            config.batch_size,
            split.total_samples(),
        )?;
        if let Some(resume) = config.resume {
            info!(
                "Resuming {} after batch {} of epoch {}",
                mode, resume.batch_index, resume.epoch_index
            );
            sampler = sampler.resume_at(resume)?;
        }

        let summary = catalog.summary(mode);
        info!("{}", summary);
        info!(
            "Pipeline: batch_size={} crop={}x{} buffer_size={} random_transform={} mean={}x{}",
            config.batch_size,
            config.crop_width,
            config.crop_height,
            config.buffer_size,
            config.random_transform,
            mean.width(),
            mean.height()
        );

        Ok(Self {
            num_batches: sampler.num_batches(),
            catalog: Arc::new(catalog),
            mean: Arc::new(mean),
            summary,
            seed,
            sampler: Mutex::new(Some(sampler)),
            running: Mutex::new(None),
            stop: StopSignal::new(),
            failure: FailureSlot::default(),
            config,
        })
    }

    /// Launches the loader and transform stages. A pipeline starts once.
    pub fn start(&self) -> Result<()> {
        if self.stop.is_triggered() {
            return Err(PipelineError::Stopped.into());
        }
        let transform = self.sample_transform()?;
        let mut running = lock(&self.running);
        let Some(sampler) = lock(&self.sampler).take() else {
            bail!("Pipeline has already been started");
        };

        let (raw_tx, raw_rx) = bounded(self.config.buffer_size);
        let (finished_tx, finished_rx) = bounded(self.config.buffer_size);

        let loader = LoaderStage::new(
            Arc::clone(&self.catalog),
            self.config.data_mode,
            sampler,
            raw_tx,
        );
        let transformer = TransformStage::new(
            transform,
            ColumnCollator,
            Some(self.seed.wrapping_add(1)),
            raw_rx.clone(),
            finished_tx,
        );

        let mut handles = Vec::with_capacity(2);
        handles.push((
            LOADER,
            spawn_stage(LOADER, self.stop.clone(), self.failure.clone(), loader)?,
        ));
        let transform_handle = spawn_stage(
            TRANSFORM,
            self.stop.clone(),
            self.failure.clone(),
            transformer,
        );
        match transform_handle {
            Ok(handle) => handles.push((TRANSFORM, handle)),
            Err(e) => {
                // Release the loader before reporting
                self.stop.trigger();
                for (_, handle) in handles {
                    let _ = handle.join();
                }
                return Err(e);
            }
        }

        info!("Pipeline started ({} batches per epoch)", self.num_batches);
        *running = Some(Running {
            raw_rx,
            finished_rx,
            handles,
        });
        Ok(())
    }

    /// `SubtractMean -> Crop -> RandomHorizontalFlip`, with random crop offsets
    /// and mirroring only when `random_transform` is on.
    fn sample_transform(&self) -> Result<impl Transform<Array3<u8>, Array3<f32>>> {
        let (crop_mode, flip) = if self.config.random_transform {
            (CropMode::Random, RandomHorizontalFlip::new(FLIP_PROBABILITY)?)
        } else {
            (CropMode::Center, RandomHorizontalFlip::disabled())
        };
        let crop = Crop::new(self.config.crop_width, self.config.crop_height, crop_mode)?;
        Ok(SubtractMean::new(&self.mean).then(crop).then(flip))
    }

    /// Blocks until the next finished batch is available.
    ///
    /// Returns the first stage error if a stage has died, and
    /// `PipelineError::Stopped` once `stop()` has been called.
    pub fn get_next_batch(&self) -> Result<FinishedBatch> {
        if let Some(err) = self.failure.surface() {
            return Err(err);
        }
        if self.stop.is_triggered() {
            return Err(PipelineError::Stopped.into());
        }

        let finished_rx = match lock(&self.running).as_ref() {
            Some(running) => running.finished_rx.clone(),
            None => bail!("Pipeline has not been started"),
        };

        pop(&finished_rx, &self.stop).map_err(|closed| {
            if let Some(err) = self.failure.surface() {
                return err;
            }
            // stop() raises the flag before any queue can disconnect
            if closed == Closed::Disconnected && !self.stop.is_triggered() {
                PipelineError::StageTerminated { stage: TRANSFORM }.into()
            } else {
                PipelineError::Stopped.into()
            }
        })
    }

    /// Stops both stages and waits for them to exit. Idempotent.
    ///
    /// Returns the first stage error unless `get_next_batch()` already reported it.
    pub fn stop(&self) -> Result<()> {
        self.stop.trigger();

        if let Some(running) = lock(&self.running).take() {
            let drained = running.raw_rx.try_iter().count() + running.finished_rx.try_iter().count();
            debug!("Discarded {} queued batches", drained);

            // Every blocking push and pop also waits on the stop signal, so the
            // joins cannot hang on a queue refilled after the drain
            for (stage, handle) in running.handles {
                if handle.join().is_err() {
                    self.failure
                        .record(stage, PipelineError::StageTerminated { stage }.into());
                }
            }
            info!("Pipeline stopped");
        }

        match self.failure.take_unreported() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.catalog.num_classes()
    }

    /// `ceil(total_samples / batch_size)` for the configured split.
    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// `(crop_width * crop_height * 3, 1)`: the shape of one flattened sample.
    pub fn data_dims(&self) -> (usize, usize) {
        (self.config.crop_width * self.config.crop_height * 3, 1)
    }

    pub fn data_summary(&self) -> &DataSummary {
        &self.summary
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether a stage has failed. The error itself comes from
    /// `get_next_batch()` or `stop()`.
    pub fn has_failed(&self) -> bool {
        self.failure.has_failed()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if lock(&self.running).is_none() {
            return;
        }
        if let Err(e) = self.stop() {
            warn!("Pipeline dropped with an unreported error: {:#}", e);
        }
    }
}
