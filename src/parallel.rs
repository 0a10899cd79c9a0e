//! Per-core trial aggregation.
//!
//! Each trial builds a fresh pool with one thread per execution unit. Every
//! unit receives a [`UnitRequest`] over its own channel, runs its share of
//! the iterations, and answers with a [`UnitResponse`] on a shared reply
//! channel. The trial resolves only after every unit has answered and the
//! pool has been torn down.
//!
//! The combined trial sums operations across units but takes the slowest
//! unit's duration as elapsed time, so a straggler caps the rate.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ambient;
use crate::driver::{derive_seed, Lcg};
use crate::error::{BenchError, Result};
use crate::harness::{courtesy_pause, execute_cancellable, panic_message, HarnessConfig};
use crate::registry::{Registry, WorkloadSpec};
use crate::trial::{Trial, TrialBatch, WorkloadResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRequest {
    pub workload_id: String,
    pub iterations: u64,
    pub seed: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub workload_id: String,
    pub operations: f64,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnitError {
    #[error("unknown workload: {0}")]
    UnknownWorkload(String),
    #[error("{0}")]
    Workload(String),
    #[error("unit panicked: {0}")]
    Panicked(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitResponse {
    Completed(UnitReport),
    Failed { error: UnitError },
    /// Stopped early because another unit failed.
    Aborted,
}

/// Iterations handed to each unit: `iterations / units`, at least 1.
pub fn split_iterations(iterations: u64, units: usize) -> u64 {
    (iterations / units.max(1) as u64).max(1)
}

/// Seed for unit `unit` of trial `trial_index`.
pub fn unit_seed(workload_id: &str, trial_index: usize, base_seed: u32, unit: usize) -> u32 {
    derive_seed(workload_id, trial_index, base_seed.wrapping_add(unit as u32))
}

/// Fold unit reports into one trial: summed operations over the longest duration.
pub fn combine(reports: &[UnitReport]) -> Trial {
    let operations = reports.iter().map(|r| r.operations).sum();
    let slowest = reports
        .iter()
        .map(|r| r.duration_secs)
        .fold(0.0f64, f64::max);
    Trial::new(slowest, operations)
}

/// Body of one execution unit: resolve the workload and run its share.
pub fn serve_unit(registry: &Registry, request: &UnitRequest, abort: &AtomicBool) -> UnitResponse {
    let Some(spec) = registry.get(&request.workload_id) else {
        return UnitResponse::Failed {
            error: UnitError::UnknownWorkload(request.workload_id.clone()),
        };
    };

    let _rng = ambient::substitute(Lcg::new(request.seed));
    match execute_cancellable(spec.workload.as_ref(), request.iterations, abort) {
        Ok(Some(trial)) => UnitResponse::Completed(UnitReport {
            workload_id: request.workload_id.clone(),
            operations: trial.work_units,
            duration_secs: trial.elapsed_secs,
        }),
        Ok(None) => UnitResponse::Aborted,
        Err(e) => UnitResponse::Failed {
            error: UnitError::Workload(e.to_string()),
        },
    }
}

/// Run one trial across `cfg.unit_count` execution units.
pub fn run_trial(
    registry: &Registry,
    workload_id: &str,
    trial_index: usize,
    cfg: &HarnessConfig,
) -> Result<Trial> {
    let units = cfg.unit_count.max(1);
    let per_unit = split_iterations(cfg.iterations, units);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(units)
        .thread_name(|i| format!("bench-unit-{i}"))
        .build()?;

    let abort = AtomicBool::new(false);
    let (reply_tx, reply_rx) = channel::unbounded::<(usize, UnitResponse)>();

    pool.scope(|scope| {
        for unit in 0..units {
            let (request_tx, request_rx) = channel::bounded::<UnitRequest>(1);
            let request = UnitRequest {
                workload_id: workload_id.to_string(),
                iterations: per_unit,
                seed: unit_seed(workload_id, trial_index, cfg.base_seed, unit),
            };
            // Capacity 1 and the receiver is still alive: never blocks, never fails.
            let _ = request_tx.send(request);

            let reply_tx = reply_tx.clone();
            let abort = &abort;
            scope.spawn(move |_| {
                let Ok(request) = request_rx.recv() else {
                    return;
                };
                let response = panic::catch_unwind(AssertUnwindSafe(|| {
                    serve_unit(registry, &request, abort)
                }))
                .unwrap_or_else(|payload| UnitResponse::Failed {
                    error: UnitError::Panicked(panic_message(&*payload)),
                });
                if matches!(response, UnitResponse::Failed { .. }) {
                    abort.store(true, Ordering::Relaxed);
                }
                let _ = reply_tx.send((unit, response));
            });
        }
    });
    drop(reply_tx);
    drop(pool);

    let mut replies: Vec<(usize, UnitResponse)> = reply_rx.iter().collect();
    replies.sort_by_key(|(unit, _)| *unit);

    let mut reports = Vec::with_capacity(units);
    for (unit, response) in replies {
        match response {
            UnitResponse::Completed(report) => reports.push(report),
            UnitResponse::Failed {
                error: UnitError::UnknownWorkload(id),
            } => {
                warn!(workload = %id, unit, "execution unit does not know workload");
                return Err(BenchError::UnknownWorkload(id));
            }
            UnitResponse::Failed { error } => {
                warn!(workload = %workload_id, trial = trial_index, unit, %error, "execution unit failed");
                return Err(BenchError::UnitFailure {
                    workload_id: workload_id.to_string(),
                    trial: trial_index,
                    unit,
                    message: error.to_string(),
                });
            }
            UnitResponse::Aborted => {}
        }
    }

    if reports.len() != units {
        return Err(BenchError::UnitFailure {
            workload_id: workload_id.to_string(),
            trial: trial_index,
            unit: reports.len(),
            message: format!("{} of {units} units reported", reports.len()),
        });
    }

    Ok(combine(&reports))
}

/// Run every trial of `spec` across execution units and reduce them to one result.
///
/// Units resolve the workload by id through `registry`.
pub fn run_workload_parallel(
    registry: &Registry,
    spec: &WorkloadSpec,
    cfg: &HarnessConfig,
) -> Result<WorkloadResult> {
    cfg.validate()?;

    let trials = cfg.trials_for(spec.class);
    let mut batch = TrialBatch::new(spec, cfg.score_divisor(), trials);

    for trial_index in 0..trials {
        let trial = run_trial(registry, &spec.id, trial_index, cfg)?;
        let (rate, score) = batch.push(trial);
        debug!(
            workload = %spec.id,
            trial = trial_index,
            units = cfg.unit_count,
            rate,
            score,
            "parallel trial complete"
        );

        if trial_index + 1 < trials {
            courtesy_pause(cfg.trial_pause);
        }
    }

    let result = batch
        .reduce(cfg.outlier_policy())
        .ok_or_else(|| BenchError::InvalidConfig("no trials were run".into()))?;
    info!(
        workload = %spec.id,
        units = cfg.unit_count,
        rate = result.average_rate,
        score = result.average_score,
        unit = %spec.unit,
        "parallel workload complete"
    );
    Ok(result)
}
