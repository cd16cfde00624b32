//! src/source.rs
//!
//! The capability a compute loop consumes. It never sees queues or threads,
//! only batches and the two sizes it needs to plan an epoch.

use crate::batch::FinishedBatch;
use crate::pipeline::Pipeline;
use anyhow::{ensure, Result};

pub trait BatchSource {
    /// Blocks until the next batch is available.
    fn next_batch(&mut self) -> Result<FinishedBatch>;

    fn num_classes(&self) -> usize;

    /// Batches in one epoch of the underlying split.
    fn num_batches(&self) -> usize;

    fn stop(&mut self) -> Result<()>;
}

impl BatchSource for Pipeline {
    fn next_batch(&mut self) -> Result<FinishedBatch> {
        self.get_next_batch()
    }

    fn num_classes(&self) -> usize {
        Pipeline::num_classes(self)
    }

    fn num_batches(&self) -> usize {
        Pipeline::num_batches(self)
    }

    fn stop(&mut self) -> Result<()> {
        Pipeline::stop(self)
    }
}

/// Feeds `f` every batch of the next `epochs` epochs, counting from the epoch of
/// the first batch received.
///
/// An epoch boundary is only visible once a batch of the following epoch has
/// been pulled. That batch is not passed to `f`; it is returned so the caller
/// can keep it.
///
/// # Example
/// ```ignore
/// let next = drain_epochs(&mut pipeline, 2, |batch| model.step(&batch))?;
/// assert_eq!(next.batch_index, 1);
/// ```
pub fn drain_epochs<S, F>(source: &mut S, epochs: usize, mut f: F) -> Result<FinishedBatch>
where
    S: BatchSource + ?Sized,
    F: FnMut(FinishedBatch) -> Result<()>,
{
    ensure!(epochs > 0, "epochs must be > 0");

    let first = source.next_batch()?;
    let last_epoch = first.epoch_index + epochs - 1;
    f(first)?;

    loop {
        let batch = source.next_batch()?;
        if batch.epoch_index > last_epoch {
            return Ok(batch);
        }
        f(batch)?;
    }
}
