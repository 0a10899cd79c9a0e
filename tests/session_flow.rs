use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel;
use throughput_bench::ambient;
use throughput_bench::driver::Lcg;
use throughput_bench::registry;
use throughput_bench::session::{rounded_mean, NoProgress};
use throughput_bench::{
    BenchError, HarnessConfig, Mode, ProgressEvent, ProgressSink, Registry, ScoreBoard,
    SessionScore, WorkloadError, WorkloadSpec,
};

fn steady(id: &str, reference_rate: f64) -> WorkloadSpec {
    WorkloadSpec::new(id, id.to_uppercase(), "ops/sec", reference_rate, 1_800, || {
        let mut acc = 0u64;
        for i in 0..200u64 {
            acc = acc.wrapping_mul(31).wrapping_add(i);
        }
        std::hint::black_box(acc);
        Ok::<f64, WorkloadError>(1.0)
    })
}

fn quick_cfg() -> HarnessConfig {
    HarnessConfig {
        iterations: 16,
        unit_count: 2,
        trials_override: Some(3),
        ..HarnessConfig::default()
    }
}

#[derive(Default)]
struct Recorder {
    started: Vec<String>,
    events: Vec<ProgressEvent>,
    failed: Vec<String>,
    finished: Option<SessionScore>,
}

impl ProgressSink for Recorder {
    fn workload_started(&mut self, _mode: Mode, spec: &WorkloadSpec) {
        self.started.push(spec.id.clone());
    }

    fn workload_finished(&mut self, event: &ProgressEvent) {
        self.events.push(event.clone());
    }

    fn workload_failed(&mut self, _mode: Mode, spec: &WorkloadSpec, _error: &BenchError) {
        self.failed.push(spec.id.clone());
    }

    fn session_finished(&mut self, score: &SessionScore) {
        self.finished = Some(score.clone());
    }
}

#[test]
fn session_reports_progress_in_registry_order() {
    let registry = Registry::new(vec![steady("gamma", 1.0), steady("alpha", 2.0), steady("beta", 4.0)]).unwrap();
    let board = ScoreBoard::new(&registry, quick_cfg()).unwrap();
    let mut recorder = Recorder::default();

    let score = board.run_session(Mode::Single, &mut recorder).unwrap();

    assert_eq!(recorder.started, ["gamma", "alpha", "beta"]);
    let completed: Vec<usize> = recorder.events.iter().map(|e| e.completed).collect();
    assert_eq!(completed, [1, 2, 3]);
    assert!(recorder.events.iter().all(|e| e.total == 3 && e.mode == Mode::Single));
    assert_eq!(recorder.events[2].fraction(), 1.0);

    let ids: Vec<&str> = score.results.iter().map(|r| r.workload_id.as_str()).collect();
    assert_eq!(ids, ["gamma", "alpha", "beta"]);

    let sum: u64 = score.results.iter().map(|r| r.average_score).sum();
    assert_eq!(score.total_score, rounded_mean(sum, 3));
    assert_eq!(recorder.events[2].running_score, score.total_score);
    assert_eq!(recorder.finished.as_ref(), Some(&score));
    assert!(recorder.failed.is_empty());
}

#[test]
fn rerun_replaces_only_its_own_mode() {
    let registry = Registry::new(vec![steady("one", 1.0), steady("two", 3.0)]).unwrap();
    let board = ScoreBoard::new(&registry, quick_cfg()).unwrap();
    assert!(board.score(Mode::Single).is_none());

    let first_single = board.run_session(Mode::Single, &mut NoProgress).unwrap();
    let parallel = board.run_session(Mode::Parallel, &mut NoProgress).unwrap();
    assert_eq!(board.score(Mode::Single), Some(first_single));
    assert_eq!(parallel.mode, Mode::Parallel);

    let second_single = board.run_session(Mode::Single, &mut NoProgress).unwrap();
    assert_eq!(board.score(Mode::Single), Some(second_single));
    assert_eq!(board.score(Mode::Parallel), Some(parallel));
}

#[test]
fn failing_workload_fails_the_session_and_restores_rng() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cfg = HarnessConfig {
        iterations: 4,
        ..HarnessConfig::default()
    };
    let per_trial = cfg.iterations as usize;

    let registry = Registry::new(vec![
        steady("fine", 1.0),
        WorkloadSpec::new("brittle", "Brittle", "ops/sec", 1.0, 1_800, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            ambient::random();
            if n == 2 * per_trial {
                return Err(WorkloadError::new("third trial failed"));
            }
            Ok(1.0)
        }),
        steady("never", 1.0),
    ])
    .unwrap();
    let board = ScoreBoard::new(&registry, cfg).unwrap();
    let mut recorder = Recorder::default();

    let _outer = ambient::substitute(Lcg::new(2024));
    let before = ambient::seeded_state();

    let err = board.run_session(Mode::Single, &mut recorder).unwrap_err();
    match &err {
        BenchError::WorkloadFailure { workload_id, trial, .. } => {
            assert_eq!(workload_id, "brittle");
            assert_eq!(*trial, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.workload_id(), Some("brittle"));

    assert_eq!(ambient::seeded_state(), before);
    assert_eq!(recorder.started, ["fine", "brittle"]);
    assert_eq!(recorder.failed, ["brittle"]);
    assert!(recorder.finished.is_none());
    assert!(board.score(Mode::Single).is_none());
    assert!(!board.is_running());
}

#[test]
fn panicking_workload_fails_the_session_in_both_modes() {
    let registry = Registry::new(vec![
        steady("fine", 1.0),
        WorkloadSpec::new("crash", "Crash", "ops/sec", 1.0, 1_800, || -> Result<f64, WorkloadError> {
            ambient::random();
            panic!("boom")
        }),
    ])
    .unwrap();
    let board = ScoreBoard::new(&registry, quick_cfg()).unwrap();

    let _outer = ambient::substitute(Lcg::new(7));
    let before = ambient::seeded_state();

    let mut recorder = Recorder::default();
    let err = board.run_session(Mode::Single, &mut recorder).unwrap_err();
    match &err {
        BenchError::WorkloadFailure { workload_id, trial, source } => {
            assert_eq!(workload_id, "crash");
            assert_eq!(*trial, 0);
            assert!(source.message().contains("boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(recorder.failed, ["crash"]);
    assert!(recorder.finished.is_none());
    assert_eq!(ambient::seeded_state(), before);

    let mut recorder = Recorder::default();
    let err = board.run_session(Mode::Parallel, &mut recorder).unwrap_err();
    assert!(matches!(err, BenchError::UnitFailure { ref message, .. } if message.contains("boom")));
    assert_eq!(recorder.failed, ["crash"]);

    assert!(board.score(Mode::Single).is_none());
    assert!(board.score(Mode::Parallel).is_none());
    assert!(!board.is_running());
}

#[test]
fn failed_rerun_keeps_previous_score() {
    let armed = Arc::new(AtomicBool::new(false));
    let trigger = Arc::clone(&armed);
    let registry = Registry::new(vec![WorkloadSpec::new("switch", "Switch", "ops/sec", 1.0, 1_800, move || {
        if trigger.load(Ordering::SeqCst) {
            Err(WorkloadError::new("switched off"))
        } else {
            Ok(1.0)
        }
    })])
    .unwrap();
    let board = ScoreBoard::new(&registry, quick_cfg()).unwrap();

    let good = board.run_session(Mode::Single, &mut NoProgress).unwrap();
    armed.store(true, Ordering::SeqCst);
    assert!(board.run_session(Mode::Single, &mut NoProgress).is_err());
    assert_eq!(board.score(Mode::Single), Some(good));
}

#[test]
fn concurrent_sessions_are_rejected() {
    let (started_tx, started_rx) = channel::bounded::<()>(1);
    let (release_tx, release_rx) = channel::bounded::<()>(1);
    let first = Arc::new(AtomicBool::new(true));
    let gate = Arc::clone(&first);

    let registry = Registry::new(vec![WorkloadSpec::new("gate", "Gate", "ops/sec", 1.0, 1_800, move || {
        if gate.swap(false, Ordering::SeqCst) {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }
        Ok::<f64, WorkloadError>(1.0)
    })])
    .unwrap();
    let cfg = HarnessConfig {
        iterations: 1,
        trials_override: Some(1),
        unit_count: 1,
        ..HarnessConfig::default()
    };
    let board = ScoreBoard::new(&registry, cfg).unwrap();

    thread::scope(|s| {
        let running = s.spawn(|| board.run_session(Mode::Single, &mut NoProgress));
        started_rx.recv().unwrap();

        assert!(board.is_running());
        assert!(matches!(board.run_session(Mode::Single, &mut NoProgress), Err(BenchError::Busy)));
        assert!(matches!(board.run_session(Mode::Parallel, &mut NoProgress), Err(BenchError::Busy)));

        release_tx.send(()).unwrap();
        running.join().unwrap().unwrap();
    });

    assert!(!board.is_running());
    assert!(board.run_session(Mode::Parallel, &mut NoProgress).is_ok());
}

#[test]
fn parallel_session_over_builtin_subset() {
    let registry = registry::builtin().select(&["html5", "horizon"]).unwrap();
    let cfg = HarnessConfig {
        iterations: 4,
        unit_count: 2,
        trials_override: Some(3),
        ..HarnessConfig::default()
    };
    let board = ScoreBoard::new(&registry, cfg).unwrap();

    let score = board.run_session(Mode::Parallel, &mut NoProgress).unwrap();
    assert_eq!(score.results.len(), 2);
    assert!(score.result("html5").unwrap().average_rate > 0.0);
    assert!(score.result("horizon").unwrap().average_rate > 0.0);
    assert_eq!(score.result("html5").unwrap().trials, 3);
}

#[test]
fn invalid_config_rejected_up_front() {
    let registry = Registry::new(vec![steady("x", 1.0)]).unwrap();
    let cfg = HarnessConfig {
        unit_count: 0,
        ..HarnessConfig::default()
    };
    assert!(matches!(ScoreBoard::new(&registry, cfg), Err(BenchError::InvalidConfig(_))));
}
