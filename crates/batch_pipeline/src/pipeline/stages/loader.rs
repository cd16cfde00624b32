//! Loader stage: sampler draws in, decoded `RawBatch`es out.
//!
//! The loader is the only owner of the `BatchSampler`, so the epoch/batch
//! counters need no synchronization.

use crate::batch::{RawBatch, RawSample};
use crate::catalog::{Catalog, DataMode};
use crate::pipeline::queue::{push, StopSignal};
use crate::pipeline::stages::Stage;
use crate::sampler::{BatchSampler, DrawBatch, Sampler};
use crate::transforms::vision::LoadSample;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use log::{debug, trace};
use std::sync::Arc;

pub(crate) struct LoaderStage<S> {
    catalog: Arc<Catalog>,
    mode: DataMode,
    sampler: BatchSampler<S>,
    loader: LoadSample,
    raw_tx: Sender<RawBatch>,
}

impl<S: Sampler + 'static> Stage for LoaderStage<S> {
    /// Runs until stopped, the transform stage disappears, or a sample fails to decode.
    fn run(&mut self, stop: &StopSignal) -> Result<()> {
        while !stop.is_triggered() {
            let draws = self.sampler.next_batch();
            let (epoch_index, batch_index) = (draws.epoch_index, draws.batch_index);

            let Some(batch) = self.load_batch(draws, stop).with_context(|| {
                format!("Failed to load batch {} of epoch {}", batch_index, epoch_index)
            })?
            else {
                break;
            };

            trace!("Loaded batch {}.{}", epoch_index, batch_index);
            if let Err(closed) = push(&self.raw_tx, batch, stop) {
                debug!("Loader exiting on {:?}", closed);
                break;
            }
        }
        Ok(())
    }
}

impl<S: Sampler> LoaderStage<S> {
    pub(crate) fn new(
        catalog: Arc<Catalog>,
        mode: DataMode,
        sampler: BatchSampler<S>,
        raw_tx: Sender<RawBatch>,
    ) -> Self {
        Self {
            catalog,
            mode,
            sampler,
            loader: LoadSample::new(),
            raw_tx,
        }
    }

    /// Decodes every draw in order. `None` if stopped part way.
    fn load_batch(&self, draws: DrawBatch, stop: &StopSignal) -> Result<Option<RawBatch>> {
        let mut samples: Vec<RawSample> = Vec::with_capacity(draws.draws.len());
        for draw in &draws.draws {
            if stop.is_triggered() {
                return Ok(None);
            }
            let path = self
                .catalog
                .resolve(self.mode, draw.class_id, draw.sample_index)?;
            samples.push(self.loader.apply((path, draw.class_id))?);
        }

        Ok(Some(RawBatch {
            epoch_index: draws.epoch_index,
            batch_index: draws.batch_index,
            samples,
        }))
    }
}
