//! Session scoring: run every registered workload and fold the results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::aggregate::run_workload;
use crate::error::{BenchError, Result};
use crate::harness::{courtesy_pause, HarnessConfig};
use crate::parallel::run_workload_parallel;
use crate::registry::{Registry, WorkloadSpec};
use crate::trial::WorkloadResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One execution unit, the calling thread.
    Single,
    /// One execution unit per core.
    Parallel,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Single => "single",
            Mode::Parallel => "parallel",
        }
    }
}

/// Headline score for one mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionScore {
    pub mode: Mode,
    /// In registry order.
    pub results: Vec<WorkloadResult>,
    pub total_score: u64,
}

impl SessionScore {
    pub fn result(&self, workload_id: &str) -> Option<&WorkloadResult> {
        self.results.iter().find(|r| r.workload_id == workload_id)
    }
}

/// Emitted after each workload finishes.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub mode: Mode,
    pub completed: usize,
    pub total: usize,
    pub result: WorkloadResult,
    /// `round(sum / completed)` over the scores so far.
    pub running_score: u64,
}

impl ProgressEvent {
    pub fn fraction(&self) -> f64 {
        self.completed as f64 / self.total as f64
    }
}

/// Consumer of incremental session output. All methods default to no-ops.
pub trait ProgressSink {
    fn workload_started(&mut self, _mode: Mode, _spec: &WorkloadSpec) {}
    fn workload_finished(&mut self, _event: &ProgressEvent) {}
    fn workload_failed(&mut self, _mode: Mode, _spec: &WorkloadSpec, _error: &BenchError) {}
    fn session_finished(&mut self, _score: &SessionScore) {}
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Logs progress through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn workload_started(&mut self, mode: Mode, spec: &WorkloadSpec) {
        info!(mode = mode.as_str(), workload = %spec.display_name, "running");
    }

    fn workload_finished(&mut self, event: &ProgressEvent) {
        info!(
            mode = event.mode.as_str(),
            progress = %format!("{}/{}", event.completed, event.total),
            workload = %event.result.workload_id,
            rate = %format!("{:.1}", event.result.average_rate),
            score = event.result.average_score,
            running = event.running_score,
            "workload scored"
        );
    }

    fn workload_failed(&mut self, mode: Mode, spec: &WorkloadSpec, error: &BenchError) {
        error!(mode = mode.as_str(), workload = %spec.id, %error, "workload failed");
    }

    fn session_finished(&mut self, score: &SessionScore) {
        info!(mode = score.mode.as_str(), total = score.total_score, "session complete");
    }
}

/// `round(sum / count)`, halves rounded up; 0 when `count` is 0.
pub fn rounded_mean(sum: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    let count = count as u64;
    (sum + count / 2) / count
}

/// Releases the run lock on drop.
struct RunLock<'a>(&'a AtomicBool);

impl<'a> RunLock<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| RunLock(flag))
            .map_err(|_| BenchError::Busy)
    }
}

impl Drop for RunLock<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs sessions and keeps the latest score per mode.
///
/// Only one session may run at a time across both modes; a second caller
/// gets [`BenchError::Busy`].
pub struct ScoreBoard<'r> {
    registry: &'r Registry,
    config: HarnessConfig,
    running: AtomicBool,
    scores: Mutex<HashMap<Mode, SessionScore>>,
}

impl<'r> ScoreBoard<'r> {
    pub fn new(registry: &'r Registry, config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            running: AtomicBool::new(false),
            scores: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Latest completed score for `mode`.
    pub fn score(&self, mode: Mode) -> Option<SessionScore> {
        self.scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&mode)
            .cloned()
    }

    /// Run every workload in registry order under `mode`.
    ///
    /// On success the score replaces the previous one for `mode`. On failure
    /// the error is returned and the previous score is left as it was.
    pub fn run_session(&self, mode: Mode, sink: &mut dyn ProgressSink) -> Result<SessionScore> {
        let _lock = RunLock::acquire(&self.running)?;

        let total = self.registry.len();
        let mut results = Vec::with_capacity(total);
        let mut score_sum = 0u64;

        for spec in self.registry.list() {
            sink.workload_started(mode, spec);
            let outcome = match mode {
                Mode::Single => run_workload(spec, &self.config),
                Mode::Parallel => run_workload_parallel(self.registry, spec, &self.config),
            };
            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    sink.workload_failed(mode, spec, &err);
                    return Err(err);
                }
            };

            score_sum += result.average_score;
            results.push(result.clone());
            let event = ProgressEvent {
                mode,
                completed: results.len(),
                total,
                result,
                running_score: rounded_mean(score_sum, results.len()),
            };
            sink.workload_finished(&event);

            courtesy_pause(self.config.workload_pause);
        }

        let score = SessionScore {
            mode,
            results,
            total_score: rounded_mean(score_sum, total),
        };
        self.scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mode, score.clone());
        sink.session_finished(&score);

        Ok(score)
    }
}
