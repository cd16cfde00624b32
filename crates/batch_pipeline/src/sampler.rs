use crate::catalog::{CatalogSplit, DataMode};
use crate::error::PipelineError;
use crate::pipeline::ResumePoint;
use anyhow::{ensure, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// One sampler draw: a class and a position inside that class's sample list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Draw {
    pub class_id: usize,
    pub sample_index: usize,
}

/// A `Sampler` defines the strategy for drawing samples from a catalog split.
///
/// Samplers are stateful: every call to `next_draw` advances them. They are
/// owned by the loader stage alone, so they only need to be `Send`.
pub trait Sampler: Send {
    fn next_draw(&mut self) -> Draw;

    /// Advances the sampler as if `draws` draws had already been made.
    /// Used when resuming. Policies whose draws are independent ignore it.
    fn fast_forward(&mut self, _draws: usize) {}
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn next_draw(&mut self) -> Draw {
        (**self).next_draw()
    }

    fn fast_forward(&mut self, draws: usize) {
        (**self).fast_forward(draws)
    }
}

// ============================================================================
/// Training policy: pick a class uniformly at random, then a sample uniformly at
/// random within that class.
///
/// Draws are independent and identically distributed, with replacement at both
/// levels. An epoch therefore does not guarantee coverage: a batch may omit
/// whole classes and repeat others. Per-class frequency converges to
/// `1 / num_classes` regardless of how many samples each class holds.
///
/// # Example
/// ```ignore
/// let mut sampler = RandomClassSampler::new(catalog.split(DataMode::Train), 42);
/// let draw = sampler.next_draw();
/// ```
#[derive(Debug, Clone)]
pub struct RandomClassSampler {
    class_lens: Vec<usize>,
    rng: StdRng,
}

impl RandomClassSampler {
    pub fn new(split: &CatalogSplit, seed: u64) -> Self {
        Self {
            class_lens: split.class_histogram(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomClassSampler {
    fn next_draw(&mut self) -> Draw {
        let class_id = self.rng.random_range(0..self.class_lens.len());
        let sample_index = self.rng.random_range(0..self.class_lens[class_id]);
        Draw {
            class_id,
            sample_index,
        }
    }
}

// ============================================================================
/// Validation policy: deterministic round-robin.
///
/// Classes are visited in id order `0, 1, .., C-1, 0, ..`. Each class keeps its
/// own cursor, which advances on every visit and wraps modulo that class's
/// sample count. No randomness is involved.
///
/// # Example
/// ```text
/// class A: [A0, A1, A2], class B: [B0, B1]
/// draws:   A0 B0 A1 B1 A2 B0 A0 B1 A1 B0 ...
/// ```
#[derive(Debug, Clone)]
pub struct RoundRobinSampler {
    class_lens: Vec<usize>,
    next_class: usize,
    next_sample: Vec<usize>,
}

impl RoundRobinSampler {
    pub fn new(split: &CatalogSplit) -> Self {
        let class_lens = split.class_histogram();
        let next_sample = vec![0; class_lens.len()];
        Self {
            class_lens,
            next_class: 0,
            next_sample,
        }
    }
}

impl Sampler for RoundRobinSampler {
    fn next_draw(&mut self) -> Draw {
        let class_id = self.next_class;
        let sample_index = self.next_sample[class_id];

        self.next_sample[class_id] = (sample_index + 1) % self.class_lens[class_id];
        self.next_class = (class_id + 1) % self.class_lens.len();

        Draw {
            class_id,
            sample_index,
        }
    }

    /// Places every cursor where `draws` round-robin draws from a fresh start
    /// would leave it, in O(num_classes).
    fn fast_forward(&mut self, draws: usize) {
        let num_classes = self.class_lens.len();
        let full_rounds = draws / num_classes;
        let partial = draws % num_classes;

        for (class_id, cursor) in self.next_sample.iter_mut().enumerate() {
            let visits = full_rounds + usize::from(class_id < partial);
            *cursor = visits % self.class_lens[class_id];
        }
        self.next_class = partial;
    }
}

/// Builds the sampler that matches `mode`.
pub fn sampler_for(mode: DataMode, split: &CatalogSplit, seed: u64) -> Box<dyn Sampler> {
    match mode {
        DataMode::Train => Box::new(RandomClassSampler::new(split, seed)),
        DataMode::Val => Box::new(RoundRobinSampler::new(split)),
    }
}

// ============================================================================
/// Epoch and batch counters of a `BatchSampler`.
///
/// Invariant: `epoch_index == 1 + total_processed / total_samples` for the batch
/// most recently produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub epoch_index: usize,
    pub batch_index: usize,
    pub total_processed: usize,
}

/// Draws for one batch, tagged with the counters it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawBatch {
    pub epoch_index: usize,
    pub batch_index: usize,
    pub draws: Vec<Draw>,
}

/// Wraps a [`Sampler`] to yield full batches of draws and keep epoch bookkeeping.
///
/// The epoch is derived purely from `total_processed`: before a batch is drawn
/// it is recomputed as `1 + total_processed / total_samples`. When it changes,
/// `batch_index` restarts, so the batches of an epoch are tagged `1..=n`.
/// Batches are always exactly `batch_size` long and may straddle an epoch
/// boundary; they carry the epoch they started in.
///
/// # Example
/// ```ignore
/// let sampler = RoundRobinSampler::new(catalog.split(DataMode::Val));
/// let mut batches = BatchSampler::new(sampler, 128, catalog.total_samples(DataMode::Val))?;
/// let batch = batches.next_batch(); // epoch 1, batch 1
/// ```
#[derive(Debug, Clone)]
pub struct BatchSampler<S> {
    sampler: S,
    batch_size: usize,
    total_samples: usize,
    state: SamplerState,
}

impl<S: Sampler> BatchSampler<S> {
    pub fn new(sampler: S, batch_size: usize, total_samples: usize) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        ensure!(total_samples > 0, "total_samples must be > 0");
        Ok(Self {
            sampler,
            batch_size,
            total_samples,
            state: SamplerState {
                epoch_index: 1,
                batch_index: 0,
                total_processed: 0,
            },
        })
    }

    /// Positions the counters (and the sampler) after `resume.batch_index`
    /// batches of `resume.epoch_index`.
    pub fn resume_at(mut self, resume: ResumePoint) -> Result<Self> {
        ensure!(resume.epoch_index > 0, "resume epoch_index is 1-based");
        let total_processed = (resume.epoch_index - 1)
            .checked_mul(self.total_samples)
            .zip(resume.batch_index.checked_mul(self.batch_size))
            .and_then(|(epochs, batches)| epochs.checked_add(batches))
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "resume point (epoch {}, batch {}) is out of range",
                    resume.epoch_index, resume.batch_index
                ))
            })?;

        self.sampler.fast_forward(total_processed);
        self.state = SamplerState {
            epoch_index: resume.epoch_index,
            batch_index: resume.batch_index,
            total_processed,
        };
        Ok(self)
    }

    pub fn next_batch(&mut self) -> DrawBatch {
        let epoch_index = 1 + self.state.total_processed / self.total_samples;
        if epoch_index != self.state.epoch_index {
            self.state.epoch_index = epoch_index;
            self.state.batch_index = 0;
        }

        let draws: Vec<Draw> = (0..self.batch_size)
            .map(|_| self.sampler.next_draw())
            .collect();
        self.state.total_processed += self.batch_size;
        self.state.batch_index += 1;

        DrawBatch {
            epoch_index: self.state.epoch_index,
            batch_index: self.state.batch_index,
            draws,
        }
    }

    /// `ceil(total_samples / batch_size)`
    pub fn num_batches(&self) -> usize {
        self.total_samples.div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }
}
