//! src/pipeline/stages/mod.rs
//!
//! The two long-lived worker stages and the thread plumbing they share.
//!
//! Each stage runs on its own named thread (`pipeline-loader`,
//! `pipeline-transform`) and talks to its neighbours only through the bounded
//! queues in `pipeline::queue`. A stage body returns:
//! - `Ok(())` when it was stopped or its neighbour went away
//! - `Err(e)` on a fatal error, which is recorded in the `FailureSlot` and
//!   triggers the stop signal so every other participant wakes up

pub(crate) mod loader;
pub(crate) mod transform;

use super::queue::{FailureSlot, StopSignal};
use crate::error::PipelineError;
use anyhow::{Context, Result};
use log::{debug, error};
use std::thread;

pub(crate) use loader::LoaderStage;
pub(crate) use transform::TransformStage;

pub(crate) const LOADER: &str = "loader";
pub(crate) const TRANSFORM: &str = "transform";

/// Records a panic as `StageTerminated` and releases everyone blocked on the
/// stop signal. Runs while the panicking stage unwinds.
struct PanicGuard {
    stage: &'static str,
    stop: StopSignal,
    failure: FailureSlot,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("{} stage panicked", self.stage);
            self.failure.record(
                self.stage,
                PipelineError::StageTerminated { stage: self.stage }.into(),
            );
            self.stop.trigger();
        }
    }
}

/// A long-lived stage loop.
pub(crate) trait Stage: Send + 'static {
    /// Runs until stopped, a neighbour disappears, or a fatal error.
    fn run(&mut self, stop: &StopSignal) -> Result<()>;
}

/// Spawns `stage` on a dedicated stage thread.
///
/// The stage, and with it its queue ends, outlives the failure record and the
/// stop trigger, so a neighbour woken by a disconnect always finds the error.
pub(crate) fn spawn_stage<S: Stage>(
    name: &'static str,
    stop: StopSignal,
    failure: FailureSlot,
    stage: S,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("pipeline-{}", name))
        .spawn(move || {
            // Declared before the guard: on unwind the guard drops first
            let mut stage = stage;
            let guard = PanicGuard {
                stage: name,
                stop: stop.clone(),
                failure: failure.clone(),
            };
            debug!("{} stage started", name);
            match stage.run(&stop) {
                Ok(()) => debug!("{} stage exited", name),
                Err(e) => {
                    error!("{} stage failed: {:#}", name, e);
                    failure.record(name, e);
                    stop.trigger();
                }
            }
            drop(guard);
            drop(stage);
        })
        .with_context(|| format!("Failed to spawn {} stage thread", name))
}
