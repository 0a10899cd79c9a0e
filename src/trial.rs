//! Trials, batches and the trimmed-mean reduction.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::registry::WorkloadSpec;

/// Shortest elapsed time a trial may report, in seconds.
pub const MIN_ELAPSED_SECS: f64 = 1e-9;

/// One timed burst of a workload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trial {
    pub elapsed_secs: f64,
    pub work_units: f64,
}

impl Trial {
    /// Elapsed time is clamped to [`MIN_ELAPSED_SECS`] so the rate stays finite.
    pub fn new(elapsed_secs: f64, work_units: f64) -> Self {
        Self {
            elapsed_secs: elapsed_secs.max(MIN_ELAPSED_SECS),
            work_units,
        }
    }

    pub fn rate(&self) -> f64 {
        self.work_units / self.elapsed_secs
    }
}

/// How extreme observations are handled before averaging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierPolicy {
    /// Drop the single lowest and highest value. Needs at least 3 values;
    /// shorter sequences are averaged untrimmed.
    #[default]
    TrimExtremes,
    KeepAll,
}

impl OutlierPolicy {
    /// Apply the policy to an ascending-sorted slice.
    pub fn trim<'a, T>(&self, sorted: &'a [T]) -> &'a [T] {
        match self {
            OutlierPolicy::TrimExtremes if sorted.len() >= 3 => &sorted[1..sorted.len() - 1],
            _ => sorted,
        }
    }
}

/// Representative rate and score for one workload under one mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkloadResult {
    pub workload_id: String,
    pub average_rate: f64,
    pub average_score: u64,
    pub trials: usize,
}

/// Trials collected for one workload under one mode.
#[derive(Clone, Debug)]
pub struct TrialBatch<'a> {
    spec: &'a WorkloadSpec,
    score_divisor: f64,
    trials: Vec<Trial>,
}

impl<'a> TrialBatch<'a> {
    pub fn new(spec: &'a WorkloadSpec, score_divisor: f64, capacity: usize) -> Self {
        Self {
            spec,
            score_divisor,
            trials: Vec::with_capacity(capacity),
        }
    }

    /// Append a trial and return its `(rate, score)`.
    pub fn push(&mut self, trial: Trial) -> (f64, u64) {
        self.trials.push(trial);
        let rate = trial.rate();
        (rate, self.score(rate))
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// `floor(raw_score / divisor)`.
    pub fn score(&self, rate: f64) -> u64 {
        (self.spec.raw_score(rate) / self.score_divisor).floor() as u64
    }

    /// Sort rates and scores independently, trim, and average.
    ///
    /// Returns `None` for an empty batch.
    pub fn reduce(self, policy: OutlierPolicy) -> Option<WorkloadResult> {
        if self.trials.is_empty() {
            return None;
        }

        let mut rates: Vec<f64> = self.trials.iter().map(Trial::rate).collect();
        let mut scores: Vec<u64> = rates.iter().map(|&r| self.score(r)).collect();
        rates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        scores.sort_unstable();

        let rates = policy.trim(&rates);
        let scores = policy.trim(&scores);

        let average_rate = rates.iter().sum::<f64>() / rates.len() as f64;
        let score_sum: u64 = scores.iter().sum();
        let average_score = score_sum / scores.len() as u64;

        Some(WorkloadResult {
            workload_id: self.spec.id.clone(),
            average_rate,
            average_score,
            trials: self.trials.len(),
        })
    }
}
