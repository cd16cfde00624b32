//! src/pipeline/mod.rs
//!
//! This module implements the double-buffered batch `Pipeline`.
//!
//! # Architecture Overview
//!
//! ```text
//!      ┌─────────────────┐
//!      │ Catalog + Mean  │ (loaded once, shared read-only via Arc)
//!      └────────┬────────┘
//!               ↓
//!      ┌─────────────────┐
//!      │  BatchSampler   │ (train: random class, val: round-robin)
//!      └────────┬────────┘
//!               │ draws, owned by the loader thread
//!               ↓
//!      ┌─────────────────┐
//!      │  Loader stage   │ decode → RawBatch
//!      └────────┬────────┘
//!               │ raw queue (bounded, buffer_size)
//!               ↓
//!      ┌─────────────────┐
//!      │ Transform stage │ mean subtraction → crop → mirror → flatten
//!      └────────┬────────┘
//!               │ finished queue (bounded, buffer_size)
//!               ↓
//!      ┌─────────────────┐
//!      │    Pipeline     │ get_next_batch() ←── consumer
//!      └─────────────────┘
//! ```
//!
//! Three participants run in parallel: the loader, the transform stage and the
//! consumer. Each queue is strict FIFO, so the `(epoch_index, batch_index)` tags a
//! consumer sees are non-decreasing and match production order.
//!
//! # Module Structure
//!
//! ```text
//! src/pipeline/
//! ├── mod.rs          # Public API exports + architecture docs
//! ├── config.rs       # PipelineConfig, builder, and validation
//! ├── controller.rs   # Pipeline: start / get_next_batch / stop
//! ├── queue.rs        # StopSignal, cancellable push/pop, FailureSlot
//! ├── stages/
//! │   ├── mod.rs      # Stage thread spawning and panic capture
//! │   ├── loader.rs   # LoaderStage
//! │   └── transform.rs# TransformStage
//! └── common/
//!     ├── mod.rs
//!     └── thread.rs   # Thread-local stage RNG
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let config = PipelineConfig::builder()
//!     .root_path("/big/nn-data/imagenet")
//!     .batch_size(128)
//!     .crop(224, 224)
//!     .random_transform(true)
//!     .build();
//!
//! let pipeline = Pipeline::new(config)?;
//! pipeline.start()?;
//! for _ in 0..pipeline.num_batches() {
//!     let batch = pipeline.get_next_batch()?;
//!     train(batch.data.view(), batch.labels.view());
//! }
//! pipeline.stop()?;
//! ```
//!
//! # Shutdown
//!
//! `stop()` triggers the stop signal, which wakes every blocked push and pop,
//! joins both stage threads, drains whatever is left in the queues and returns
//! the first stage error if nobody has reported it yet. If a stage fails on its
//! own, the same signal fires, so a consumer blocked in `get_next_batch()`
//! returns that error instead of waiting on a queue nobody will fill.

pub(crate) mod common;
pub mod config;
pub mod controller;
pub(crate) mod queue;
pub(crate) mod stages;

pub use common::thread::{init_stage_rng, stage_gen_bool, stage_gen_range};
pub use config::{PipelineConfig, PipelineConfigBuilder, ResumePoint};
pub use controller::Pipeline;
