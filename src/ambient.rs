//! The ambient random source seen by workload bodies.
//!
//! Each thread owns one slot. Outside a trial it holds an entropy-seeded
//! `ChaCha8Rng`; during a trial the harness swaps in a seeded [`Lcg`] through
//! [`substitute`], and the returned [`AmbientGuard`] puts the previous source
//! back when it is dropped. Drop runs on every exit path, including `?`
//! returns and panic unwinding, so a failed trial never leaves its generator
//! behind. Guards nest; they must be dropped in reverse order of creation,
//! which scoping guarantees.

use std::cell::RefCell;
use std::marker::PhantomData;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::driver::Lcg;

enum Source {
    Entropy(ChaCha8Rng),
    Seeded(Lcg),
}

impl Source {
    fn next_f64(&mut self) -> f64 {
        match self {
            Source::Entropy(rng) => rng.gen::<f64>(),
            Source::Seeded(lcg) => lcg.next_f64(),
        }
    }
}

thread_local! {
    static SLOT: RefCell<Source> = RefCell::new(Source::Entropy(ChaCha8Rng::from_entropy()));
}

/// Restores the previous ambient source on drop.
///
/// Not `Send`: it must be dropped on the thread whose slot it modified.
#[must_use = "the seeded source is removed as soon as the guard is dropped"]
pub struct AmbientGuard {
    previous: Option<Source>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // The slot is gone only during thread teardown; nothing to restore then.
            let _ = SLOT.try_with(|slot| slot.replace(previous));
        }
    }
}

/// Install `generator` as this thread's ambient source until the guard drops.
pub fn substitute(generator: Lcg) -> AmbientGuard {
    let previous = SLOT.with(|slot| slot.replace(Source::Seeded(generator)));
    AmbientGuard {
        previous: Some(previous),
        _thread_bound: PhantomData,
    }
}

/// Run `f` with a generator seeded from `seed`, restoring the prior source afterwards.
pub fn with_seed<T>(seed: u32, f: impl FnOnce() -> T) -> T {
    let _guard = substitute(Lcg::new(seed));
    f()
}

/// Next float in `[0, 1)` from the ambient source.
pub fn random() -> f64 {
    SLOT.with(|slot| slot.borrow_mut().next_f64())
}

/// Uniform index in `0..n`; returns 0 when `n` is 0.
pub fn below(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    ((random() * n as f64) as usize).min(n - 1)
}

/// State of the seeded generator currently installed, if any.
pub fn seeded_state() -> Option<u32> {
    SLOT.with(|slot| match &*slot.borrow() {
        Source::Seeded(lcg) => Some(lcg.state()),
        Source::Entropy(_) => None,
    })
}
