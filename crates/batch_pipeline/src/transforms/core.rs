use anyhow::{Context, Result};
use std::any::type_name;
use std::marker::PhantomData;

/// One per-sample step of the transform stage, turning an `I` into an `O`.
///
/// Steps are stateless: randomness comes from the stage RNG of the thread that
/// calls `apply`. The transform stage composes its steps with `.then(...)`,
/// e.g. `SubtractMean::new(&mean).then(crop).then(flip)`, which yields one
/// concrete type and no dynamic dispatch per sample.
pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: I) -> Result<O>;

    /// Feeds this step's output into `next`.
    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain::new(self, next)
    }
}

/// Two steps run back to back; `M` is the value handed between them.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _between: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _between: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    /// A failure is tagged with the step that raised it; the typed cause stays
    /// at the root of the error chain.
    fn apply(&self, input: I) -> Result<O> {
        let between = self
            .first
            .apply(input)
            .with_context(|| format!("Sample step {} failed", type_name::<A>()))?;
        self.second.apply(between).with_context(|| {
            format!(
                "Sample step {} failed after {}",
                type_name::<B>(),
                type_name::<A>()
            )
        })
    }
}
