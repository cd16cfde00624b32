//! Double-buffered image batch pipeline.
//!
//! A loader thread decodes sampled images into raw batches while a transform
//! thread turns the previous ones into mean-subtracted, cropped, flattened
//! feature matrices. Bounded queues between them give backpressure, and a
//! shared stop signal makes every blocking step cancellable.
//!
//! See [`pipeline`] for the architecture and [`Pipeline`] for the lifecycle.

pub mod batch;
pub mod catalog;
pub mod collator;
pub mod error;
pub mod pipeline;
pub mod sampler;
pub mod source;
pub mod transforms;

pub use batch::{FinishedBatch, RawBatch, RawSample};
pub use catalog::{Catalog, DataMode, DataSummary, MeanImage};
pub use collator::{Collator, ColumnCollator};
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineConfig, ResumePoint};
pub use source::{drain_epochs, BatchSource};
