//! Cancellable queue operations and the shared failure slot.
//!
//! Both stage queues are plain `crossbeam_channel::bounded` channels. What makes a
//! blocking push or pop cancellable is the `StopSignal`: it owns the only sender
//! of a zero-capacity channel that nobody ever sends on. Triggering the signal
//! drops that sender, which disconnects every clone of the receiver at once, so a
//! `select!` over "queue ready" and "stop receiver ready" wakes immediately.

use crate::error::PipelineError;
use anyhow::Error;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Why a blocking queue operation returned without an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closed {
    /// The stop signal fired.
    Stopped,
    /// The other end of the queue is gone.
    Disconnected,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking stage must not wedge shutdown
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One-shot, broadcast cancellation shared by the controller and both stages.
#[derive(Debug, Clone)]
pub(crate) struct StopSignal {
    flag: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    stopped: Receiver<()>,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            stopped: rx,
        }
    }

    /// Idempotent.
    pub(crate) fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        lock(&self.trigger).take();
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Blocks until `item` is queued, the stop signal fires, or the receiver is gone.
pub(crate) fn push<T>(tx: &Sender<T>, item: T, stop: &StopSignal) -> Result<(), Closed> {
    select! {
        send(tx, item) -> sent => sent.map_err(|_| Closed::Disconnected),
        recv(stop.stopped) -> _ => Err(Closed::Stopped),
    }
}

/// Blocks until an item arrives, the stop signal fires, or every sender is gone.
pub(crate) fn pop<T>(rx: &Receiver<T>, stop: &StopSignal) -> Result<T, Closed> {
    select! {
        recv(rx) -> item => item.map_err(|_| Closed::Disconnected),
        recv(stop.stopped) -> _ => Err(Closed::Stopped),
    }
}

#[derive(Debug, Default)]
struct Failure {
    stage: Option<&'static str>,
    error: Option<Error>,
}

/// Records the first error raised by any stage.
///
/// The original error is handed out exactly once, to whichever of
/// `get_next_batch` or `stop` observes it first. Later observers get
/// `PipelineError::StageTerminated` naming the failed stage.
#[derive(Debug, Clone, Default)]
pub(crate) struct FailureSlot {
    inner: Arc<Mutex<Failure>>,
}

impl FailureSlot {
    /// Keeps only the first failure.
    pub(crate) fn record(&self, stage: &'static str, error: Error) {
        let mut failure = lock(&self.inner);
        if failure.stage.is_none() {
            failure.stage = Some(stage);
            failure.error = Some(error);
        }
    }

    pub(crate) fn has_failed(&self) -> bool {
        lock(&self.inner).stage.is_some()
    }

    /// The recorded error if it was not yet reported, otherwise a
    /// `StageTerminated` for the failed stage. `None` while healthy.
    pub(crate) fn surface(&self) -> Option<Error> {
        let mut failure = lock(&self.inner);
        let stage = failure.stage?;
        Some(
            failure
                .error
                .take()
                .unwrap_or_else(|| PipelineError::StageTerminated { stage }.into()),
        )
    }

    /// The recorded error, only if nobody has reported it yet.
    pub(crate) fn take_unreported(&self) -> Option<Error> {
        lock(&self.inner).error.take()
    }
}
