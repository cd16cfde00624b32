//! Thread-local randomness for stage threads.
//!
//! Random transforms draw from a per-thread RNG so that a seeded pipeline
//! augments identically on every run, without sharing a locked RNG across threads.

use rand::rngs::StdRng;
use rand::Rng as _;
use rand::SeedableRng;
use std::cell::RefCell;
use std::ops::Range;

thread_local! {
    /// Thread-local RNG for deterministic augmentation in stage threads
    pub static STAGE_RNG: RefCell<Option<StdRng>> = RefCell::new(None);
}

/// Initialize the calling thread's RNG. `None` seeds from OS entropy.
pub fn init_stage_rng(seed: Option<u64>) {
    STAGE_RNG.with(|rng| {
        *rng.borrow_mut() = Some(match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        });
    })
}

/// Get a random bool from the stage RNG, or `rand::rng()` outside a stage thread.
pub fn stage_gen_bool(p: f64) -> bool {
    STAGE_RNG.with(|rng| {
        let mut rng_ref = rng.borrow_mut();
        match rng_ref.as_mut() {
            Some(rng) => rng.random_bool(p),
            None => rand::rng().random_bool(p),
        }
    })
}

/// Uniform draw from a non-empty half-open range.
pub fn stage_gen_range(range: Range<usize>) -> usize {
    STAGE_RNG.with(|rng| {
        let mut rng_ref = rng.borrow_mut();
        match rng_ref.as_mut() {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    })
}
