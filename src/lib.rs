//! Synthetic throughput index.
//!
//! Runs a fixed registry of CPU workloads several times each, turns every
//! trial's rate into a score against per-workload reference values, trims the
//! extremes, and averages the per-workload scores into one headline number,
//! either on a single thread or with one execution unit per core.

pub mod aggregate;
pub mod ambient;
pub mod driver;
pub mod error;
pub mod harness;
pub mod parallel;
pub mod registry;
pub mod schema;
pub mod session;
pub mod trial;
pub mod workloads;

pub use error::{BenchError, Result, WorkloadError};
pub use harness::{HarnessConfig, Profile};
pub use registry::{Registry, TrialClass, Workload, WorkloadSpec};
pub use session::{Mode, ProgressEvent, ProgressSink, ScoreBoard, SessionScore};
pub use trial::{OutlierPolicy, Trial, WorkloadResult};
