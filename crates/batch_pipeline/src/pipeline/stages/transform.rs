//! Transform stage: `RawBatch`es in, `FinishedBatch`es out.
//!
//! Every sample goes through the same per-sample transform (mean subtraction,
//! crop, optional mirror) and the batch is then flattened column-wise by the
//! collator. There is exactly one transform thread, so batches leave in the
//! order they arrived.

use crate::batch::{FinishedBatch, ProcessedSample, RawBatch};
use crate::collator::Collator;
use crate::pipeline::common::thread::init_stage_rng;
use crate::pipeline::queue::{pop, push, StopSignal};
use crate::pipeline::stages::Stage;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};
use ndarray::Array3;

pub(crate) struct TransformStage<T, C> {
    transform: T,
    collator: C,
    seed: Option<u64>,
    raw_rx: Receiver<RawBatch>,
    finished_tx: Sender<FinishedBatch>,
}

impl<T, C> TransformStage<T, C>
where
    T: Transform<Array3<u8>, Array3<f32>>,
    C: Collator,
{
    pub(crate) fn new(
        transform: T,
        collator: C,
        seed: Option<u64>,
        raw_rx: Receiver<RawBatch>,
        finished_tx: Sender<FinishedBatch>,
    ) -> Self {
        Self {
            transform,
            collator,
            seed,
            raw_rx,
            finished_tx,
        }
    }

    fn finish(&self, raw: RawBatch) -> Result<FinishedBatch> {
        let processed = raw
            .samples
            .into_iter()
            .map(|sample| -> Result<ProcessedSample> {
                Ok(ProcessedSample {
                    label: sample.label,
                    pixels: self.transform.apply(sample.pixels)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (data, labels) = self.collator.collate(&processed)?;
        Ok(FinishedBatch {
            epoch_index: raw.epoch_index,
            batch_index: raw.batch_index,
            data,
            labels,
        })
    }
}

impl<T, C> Stage for TransformStage<T, C>
where
    T: Transform<Array3<u8>, Array3<f32>> + 'static,
    C: Collator + 'static,
{
    /// Runs until stopped, either neighbour disappears, or a sample is rejected.
    fn run(&mut self, stop: &StopSignal) -> Result<()> {
        init_stage_rng(self.seed);

        while !stop.is_triggered() {
            let raw = match pop(&self.raw_rx, stop) {
                Ok(raw) => raw,
                Err(closed) => {
                    debug!("Transform exiting on {:?}", closed);
                    break;
                }
            };

            let (epoch_index, batch_index) = (raw.epoch_index, raw.batch_index);
            let finished = self.finish(raw).with_context(|| {
                format!(
                    "Failed to transform batch {} of epoch {}",
                    batch_index, epoch_index
                )
            })?;

            trace!("Finished batch {}.{}", epoch_index, batch_index);
            if let Err(closed) = push(&self.finished_tx, finished, stop) {
                debug!("Transform exiting on {:?}", closed);
                break;
            }
        }
        Ok(())
    }
}
