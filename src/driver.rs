//! Deterministic seeding for repeated trials.
//!
//! Every trial of a workload gets its own seed derived from the workload id,
//! the trial index and a base seed, so trial `n` of a run always sees the same
//! random inputs as trial `n` of any other run. Throughput differences then
//! come from execution speed, not from different random work.

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

const LCG_MUL: u32 = 1_664_525;
const LCG_INC: u32 = 1_013_904_223;

/// 2^32 as a float; divides the generator state into `[0, 1)`.
const STATE_SPAN: f64 = 4_294_967_296.0;

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Seed for trial `trial_index` of `workload_id`.
///
/// Hashes `"{workload_id}:{base_seed}:{trial_index}"` with FNV-1a, then XORs
/// the base seed back in. Never returns zero.
pub fn derive_seed(workload_id: &str, trial_index: usize, base_seed: u32) -> u32 {
    let key = format!("{workload_id}:{base_seed}:{trial_index}");
    match fnv1a(key.as_bytes()) ^ base_seed {
        0 => 1,
        seed => seed,
    }
}

/// Linear-congruential generator over `u32` state.
///
/// Yields floats in `[0, 1)` forever; restart a sequence by constructing a new
/// generator from the same seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    /// A zero seed is bumped to 1.
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / STATE_SPAN
    }
}

impl Iterator for Lcg {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_f64())
    }
}
