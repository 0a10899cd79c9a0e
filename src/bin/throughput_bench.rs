use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use throughput_bench::driver::{derive_seed, Lcg};
use throughput_bench::harness::{HarnessConfig, Profile, DEFAULT_ITERATIONS};
use throughput_bench::registry::{self, Registry};
use throughput_bench::schema::{BenchReport, RunMeta, SessionReport, SCHEMA_VERSION};
use throughput_bench::session::{LogProgress, Mode, ScoreBoard};
use throughput_bench::{aggregate, parallel, BenchError};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    /// 10/5 trials, min and max dropped, divisor 1800.
    Trimmed,
    /// 5 trials, plain mean, divisor 2000.
    Legacy,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Trimmed => Profile::Trimmed,
            ProfileArg::Legacy => Profile::Legacy,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SessionArg {
    Single,
    Parallel,
    /// Single first, then parallel.
    Both,
}

impl SessionArg {
    fn modes(self) -> &'static [Mode] {
        match self {
            SessionArg::Single => &[Mode::Single],
            SessionArg::Parallel => &[Mode::Parallel],
            SessionArg::Both => &[Mode::Single, Mode::Parallel],
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered workloads with their reference values.
    List,

    /// Run full sessions and print the score report.
    Run {
        #[arg(long, value_enum, default_value_t = SessionArg::Single)]
        mode: SessionArg,

        /// Restrict the session to these workload ids (comma-separated).
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },

    /// Run a single workload and print its result.
    Workload {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(long, value_enum, default_value_t = Mode::Single)]
        mode: Mode,
    },

    /// Show the derived seed and first generator outputs for one trial.
    Seed {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(long, default_value_t = 0)]
        trial: usize,

        /// How many generator outputs to print.
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

#[derive(Parser, Debug)]
#[command(name = "throughput-bench")]
#[command(about = "Synthetic throughput index over simulated workloads (JSON output)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Trimmed, global = true)]
    profile: ProfileArg,

    #[arg(long, default_value_t = 0, global = true)]
    seed: u32,

    /// Workload calls per trial.
    #[arg(long, default_value_t = DEFAULT_ITERATIONS, global = true)]
    iterations: u64,

    /// Execution units for parallel mode. Defaults to the number of logical cores.
    #[arg(long, global = true)]
    units: Option<usize>,

    /// Override the profile's trial count for every workload.
    #[arg(long, global = true)]
    trials: Option<usize>,

    /// Pause between trials and between workloads, in milliseconds.
    #[arg(long, default_value_t = 0, global = true)]
    pause_ms: u64,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(long, short, default_value_t = false, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn init_logging(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn unix_secs_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn git_sha_short() -> Option<String> {
    // Best-effort: read from environment set by CI/build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn harness_config(args: &Args) -> HarnessConfig {
    let pause = Duration::from_millis(args.pause_ms);
    let defaults = HarnessConfig::default();
    HarnessConfig {
        profile: args.profile.into(),
        iterations: args.iterations,
        base_seed: args.seed,
        unit_count: args.units.unwrap_or(defaults.unit_count),
        trial_pause: pause,
        workload_pause: pause,
        trials_override: args.trials,
    }
}

fn print_registry(registry: &Registry, cfg: &HarnessConfig) {
    println!(
        "{:<12} {:<20} {:<12} {:>10} {:>8} {:>7}",
        "ID", "NAME", "UNIT", "REF RATE", "REF PTS", "TRIALS"
    );
    for spec in registry.list() {
        println!(
            "{:<12} {:<20} {:<12} {:>10.1} {:>8} {:>7}",
            spec.id,
            spec.display_name,
            spec.unit,
            spec.reference_rate,
            spec.reference_score,
            cfg.trials_for(spec.class)
        );
    }
}

fn emit(report: &BenchReport, out: Option<&PathBuf>) -> Result<(), BenchError> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(out) = out {
        fs::write(out, json)?;
    } else {
        println!("{json}");
    }
    Ok(())
}

fn main() -> Result<(), BenchError> {
    let args = Args::parse();
    init_logging(args.quiet);

    let cfg = harness_config(&args);
    cfg.validate()?;

    let builtin = registry::builtin();
    let mut sessions = Vec::new();

    match &args.cmd {
        Command::List => {
            print_registry(builtin, &cfg);
            // Skip normal JSON report for list
            return Ok(());
        }
        Command::Seed { id, trial, count } => {
            if builtin.get(id).is_none() {
                return Err(BenchError::UnknownWorkload(id.clone()));
            }
            let seed = derive_seed(id, *trial, cfg.base_seed);
            println!("{id} trial {trial} base {}: seed {seed}", cfg.base_seed);
            for (i, v) in Lcg::new(seed).take(*count).enumerate() {
                println!("  [{i}] {v:.9}");
            }
            return Ok(());
        }
        Command::Workload { id, mode } => {
            let spec = builtin
                .get(id)
                .ok_or_else(|| BenchError::UnknownWorkload(id.clone()))?;
            let result = match mode {
                Mode::Single => aggregate::run_workload(spec, &cfg)?,
                Mode::Parallel => parallel::run_workload_parallel(builtin, spec, &cfg)?,
            };
            let score = throughput_bench::SessionScore {
                mode: *mode,
                total_score: result.average_score,
                results: vec![result],
            };
            sessions.push(SessionReport::from_score(&score, builtin));
        }
        Command::Run { mode, only } => {
            let selected;
            let registry = if only.is_empty() {
                builtin
            } else {
                selected = builtin.select(only)?;
                &selected
            };

            let board = ScoreBoard::new(registry, cfg.clone())?;
            let mut progress = LogProgress;
            for &m in mode.modes() {
                let score = board.run_session(m, &mut progress)?;
                sessions.push(SessionReport::from_score(&score, board.registry()));
            }
        }
    }

    let report = BenchReport {
        run: RunMeta {
            schema_version: SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: cfg.profile.as_str().to_string(),
            seed: cfg.base_seed,
            iterations: cfg.iterations,
            unit_count: cfg.unit_count,
            generated_unix_secs: unix_secs_now(),
            git_sha: git_sha_short(),
        },
        sessions,
    };

    emit(&report, args.out.as_ref())
}
