use std::any::Any;
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{BenchError, Result, WorkloadError};
use crate::registry::{TrialClass, Workload};
use crate::trial::{OutlierPolicy, Trial};

/// Default iterations per trial burst.
pub const DEFAULT_ITERATIONS: u64 = 300;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    /// 10 trials (5 for heavy workloads), extremes trimmed, divisor 1800.
    #[default]
    Trimmed,
    /// 5 trials everywhere, plain mean, divisor 2000. Scores are not
    /// comparable with `Trimmed`.
    Legacy,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Trimmed => "trimmed",
            Profile::Legacy => "legacy",
        }
    }

    pub fn trials(&self, class: TrialClass) -> usize {
        match (self, class) {
            (Profile::Trimmed, TrialClass::Standard) => 10,
            (Profile::Trimmed, TrialClass::Heavy) => 5,
            (Profile::Legacy, _) => 5,
        }
    }

    pub fn outlier_policy(&self) -> OutlierPolicy {
        match self {
            Profile::Trimmed => OutlierPolicy::TrimExtremes,
            Profile::Legacy => OutlierPolicy::KeepAll,
        }
    }

    pub fn score_divisor(&self) -> f64 {
        match self {
            Profile::Trimmed => 1_800.0,
            Profile::Legacy => 2_000.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub profile: Profile,
    /// Workload calls per trial (split across units in parallel mode).
    pub iterations: u64,
    pub base_seed: u32,
    /// Execution units per parallel trial.
    pub unit_count: usize,
    /// Pause after each trial; zero means yield only.
    pub trial_pause: Duration,
    /// Pause after each workload; zero means yield only.
    pub workload_pause: Duration,
    /// Overrides the profile's trial count for every class when set.
    pub trials_override: Option<usize>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            iterations: DEFAULT_ITERATIONS,
            base_seed: 0,
            unit_count: num_cpus::get().max(1),
            trial_pause: Duration::ZERO,
            workload_pause: Duration::ZERO,
            trials_override: None,
        }
    }
}

impl HarnessConfig {
    pub fn with_profile(profile: Profile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(BenchError::InvalidConfig("iterations must be at least 1".into()));
        }
        if self.unit_count == 0 {
            return Err(BenchError::InvalidConfig("unit count must be at least 1".into()));
        }
        if self.trials_override == Some(0) {
            return Err(BenchError::InvalidConfig("trial count must be at least 1".into()));
        }
        Ok(())
    }

    pub fn trials_for(&self, class: TrialClass) -> usize {
        self.trials_override
            .unwrap_or_else(|| self.profile.trials(class))
    }

    pub fn outlier_policy(&self) -> OutlierPolicy {
        self.profile.outlier_policy()
    }

    pub fn score_divisor(&self) -> f64 {
        self.profile.score_divisor()
    }
}

/// Sleep for `pause`, or just yield the thread when it is zero.
pub fn courtesy_pause(pause: Duration) {
    if pause.is_zero() {
        thread::yield_now();
    } else {
        thread::sleep(pause);
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn checked_units(workload: &dyn Workload) -> std::result::Result<f64, WorkloadError> {
    let units = black_box(workload.run()?);
    if units.is_finite() && units >= 0.0 {
        Ok(units)
    } else {
        Err(WorkloadError::new(format!("invalid work-unit count {units}")))
    }
}

/// Run `workload` `iterations` times back to back and time the whole burst.
///
/// The first error aborts the burst. Negative or non-finite unit counts are
/// treated as workload errors.
pub fn execute_once(workload: &dyn Workload, iterations: u64) -> std::result::Result<Trial, WorkloadError> {
    let mut work_units = 0.0f64;

    let start = Instant::now();
    for _ in 0..iterations {
        work_units += checked_units(workload)?;
    }
    let elapsed = start.elapsed();

    Ok(Trial::new(elapsed.as_secs_f64(), work_units))
}

/// Like [`execute_once`], but checks `cancel` before every call.
///
/// Returns `Ok(None)` if the burst was cancelled.
pub fn execute_cancellable(
    workload: &dyn Workload,
    iterations: u64,
    cancel: &AtomicBool,
) -> std::result::Result<Option<Trial>, WorkloadError> {
    let mut work_units = 0.0f64;

    let start = Instant::now();
    for _ in 0..iterations {
        if cancel.load(AtomicOrdering::Relaxed) {
            return Ok(None);
        }
        work_units += checked_units(workload)?;
    }
    let elapsed = start.elapsed();

    Ok(Some(Trial::new(elapsed.as_secs_f64(), work_units)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn execute_once_sums_units() {
        let calls = AtomicU64::new(0);
        let workload = || {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<f64, WorkloadError>(2.5)
        };
        let trial = execute_once(&workload, 40).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 40);
        assert_eq!(trial.work_units, 100.0);
        assert!(trial.elapsed_secs > 0.0);
    }

    #[test]
    fn execute_once_stops_at_first_error() {
        let calls = AtomicU64::new(0);
        let workload = || {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            if n == 3 {
                Err(WorkloadError::new("boom"))
            } else {
                Ok(1.0)
            }
        };
        let err = execute_once(&workload, 10).unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn execute_once_rejects_negative_units() {
        let workload = || Ok::<f64, WorkloadError>(-1.0);
        assert!(execute_once(&workload, 1).is_err());
    }

    #[test]
    fn cancelled_burst_reports_nothing() {
        let cancel = AtomicBool::new(true);
        let workload = || Ok::<f64, WorkloadError>(1.0);
        assert_eq!(execute_cancellable(&workload, 10, &cancel).unwrap(), None);

        cancel.store(false, Ordering::Relaxed);
        let trial = execute_cancellable(&workload, 10, &cancel).unwrap().unwrap();
        assert_eq!(trial.work_units, 10.0);
    }

    #[test]
    fn profiles() {
        let trimmed = HarnessConfig::with_profile(Profile::Trimmed);
        assert_eq!(trimmed.trials_for(TrialClass::Standard), 10);
        assert_eq!(trimmed.trials_for(TrialClass::Heavy), 5);
        assert_eq!(trimmed.score_divisor(), 1_800.0);
        assert_eq!(trimmed.outlier_policy(), OutlierPolicy::TrimExtremes);

        let legacy = HarnessConfig::with_profile(Profile::Legacy);
        assert_eq!(legacy.trials_for(TrialClass::Standard), 5);
        assert_eq!(legacy.trials_for(TrialClass::Heavy), 5);
        assert_eq!(legacy.score_divisor(), 2_000.0);
        assert_eq!(legacy.outlier_policy(), OutlierPolicy::KeepAll);
    }

    #[test]
    fn validate_rejects_zeroes() {
        let mut cfg = HarnessConfig::default();
        cfg.validate().unwrap();

        cfg.iterations = 0;
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidConfig(_))));

        let cfg = HarnessConfig {
            unit_count: 0,
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = HarnessConfig {
            trials_override: Some(0),
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
