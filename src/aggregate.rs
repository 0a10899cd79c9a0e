//! Sequential trial aggregation.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, info, warn};

use crate::ambient;
use crate::driver::{derive_seed, Lcg};
use crate::error::{BenchError, Result, WorkloadError};
use crate::harness::{courtesy_pause, execute_once, panic_message, HarnessConfig};
use crate::registry::WorkloadSpec;
use crate::trial::{TrialBatch, WorkloadResult};

/// Run every trial of `spec` on the calling thread and reduce them to one result.
///
/// Each trial runs under its own seeded ambient generator. A failing or
/// panicking trial aborts the batch; no partial result is produced.
pub fn run_workload(spec: &WorkloadSpec, cfg: &HarnessConfig) -> Result<WorkloadResult> {
    cfg.validate()?;

    let trials = cfg.trials_for(spec.class);
    let mut batch = TrialBatch::new(spec, cfg.score_divisor(), trials);

    for trial_index in 0..trials {
        let seed = derive_seed(&spec.id, trial_index, cfg.base_seed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _rng = ambient::substitute(Lcg::new(seed));
            execute_once(spec.workload.as_ref(), cfg.iterations)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(&*payload);
            warn!(workload = %spec.id, trial = trial_index, %message, "workload panicked");
            Err(WorkloadError::new(format!("workload panicked: {message}")))
        });
        let trial = outcome.map_err(|source| BenchError::WorkloadFailure {
            workload_id: spec.id.clone(),
            trial: trial_index,
            source,
        })?;

        let (rate, score) = batch.push(trial);
        debug!(
            workload = %spec.id,
            trial = trial_index,
            seed,
            rate,
            score,
            "trial complete"
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
        rate = result.average_rate,
        score = result.average_score,
        unit = %spec.unit,
        "workload complete"
    );
    Ok(result)
}
