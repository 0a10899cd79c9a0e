//! Error types for the harness.

use std::io;

use thiserror::Error;

/// Error raised by a workload body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct WorkloadError {
    message: String,
}

impl WorkloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors produced by the benchmark harness.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("workload `{workload_id}` failed on trial {trial}: {source}")]
    WorkloadFailure {
        workload_id: String,
        trial: usize,
        #[source]
        source: WorkloadError,
    },

    #[error("execution unit {unit} failed during `{workload_id}` trial {trial}: {message}")]
    UnitFailure {
        workload_id: String,
        trial: usize,
        unit: usize,
        message: String,
    },

    #[error("unknown workload: {0}")]
    UnknownWorkload(String),

    #[error("invalid registry: {0}")]
    InvalidRegistry(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start execution units: {0}")]
    UnitPool(#[from] rayon::ThreadPoolBuildError),

    #[error("a benchmark session is already running")]
    Busy,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Id of the workload this error is attributed to, if any.
    pub fn workload_id(&self) -> Option<&str> {
        match self {
            BenchError::WorkloadFailure { workload_id, .. }
            | BenchError::UnitFailure { workload_id, .. } => Some(workload_id),
            BenchError::UnknownWorkload(id) => Some(id),
            _ => None,
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, BenchError>;
