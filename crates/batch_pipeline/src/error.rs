//! src/error.rs
//!
//! Failure taxonomy for the batch pipeline.
//!
//! Every public operation returns `anyhow::Result`, with a `PipelineError` at the
//! root of the chain. Callers that need to tell a corrupt sample apart from a bad
//! configuration downcast:
//!
//! ```ignore
//! match pipeline.get_next_batch() {
//!     Ok(batch) => train(batch),
//!     Err(e) => match e.downcast_ref::<PipelineError>() {
//!         Some(PipelineError::Decode { path, .. }) => rebuild_catalog(path),
//!         _ => return Err(e),
//!     },
//! }
//! ```
//!
//! None of these are retried inside the pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or malformed catalog, mean source, or configuration value.
    /// Raised at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A sample could not be read or decoded. Fatal: it points at catalog
    /// corruption, not a transient condition.
    #[error("failed to decode sample {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The sample is not strictly larger than the crop on both axes.
    #[error(
        "sample of {width}x{height} cannot be cropped to {crop_width}x{crop_height} \
         (source must be strictly larger on both axes)"
    )]
    Geometry {
        width: usize,
        height: usize,
        crop_width: usize,
        crop_height: usize,
    },

    /// The sample's dimensions differ from the mean image, so the elementwise
    /// subtraction is undefined.
    #[error(
        "sample of {width}x{height}x{channels} does not match the \
         {mean_width}x{mean_height}x3 mean image"
    )]
    MeanShape {
        width: usize,
        height: usize,
        channels: usize,
        mean_width: usize,
        mean_height: usize,
    },

    /// A stage exited (panic or disconnect) without recording a typed error.
    #[error("{stage} stage terminated unexpectedly")]
    StageTerminated { stage: &'static str },

    /// A blocking operation was cancelled by `stop()`.
    #[error("pipeline stopped")]
    Stopped,
}

impl PipelineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }

    /// Whether this error is the ordinary result of a requested shutdown.
    pub fn is_stop(&self) -> bool {
        matches!(self, PipelineError::Stopped)
    }
}
