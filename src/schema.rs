use serde::{Deserialize, Serialize};

use crate::registry::Registry;
use crate::session::{Mode, SessionScore};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u32,
    pub iterations: u64,
    pub unit_count: usize,
    /// Seconds since the Unix epoch when the report was assembled.
    pub generated_unix_secs: u64,
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadEntry {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub average_rate: f64,
    pub average_score: u64,
    pub trials: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub mode: Mode,
    pub total_score: u64,
    pub workloads: Vec<WorkloadEntry>,
}

impl SessionReport {
    /// Join a session score with display metadata from `registry`.
    pub fn from_score(score: &SessionScore, registry: &Registry) -> Self {
        let workloads = score
            .results
            .iter()
            .map(|r| {
                let spec = registry.get(&r.workload_id);
                WorkloadEntry {
                    id: r.workload_id.clone(),
                    name: spec.map(|s| s.display_name.clone()).unwrap_or_default(),
                    unit: spec.map(|s| s.unit.clone()).unwrap_or_default(),
                    average_rate: r.average_rate,
                    average_score: r.average_score,
                    trials: r.trials,
                }
            })
            .collect();

        Self {
            mode: score.mode,
            total_score: score.total_score,
            workloads,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub sessions: Vec<SessionReport>,
}
