//! Workload descriptors and the registry that orders them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{BenchError, Result, WorkloadError};
use crate::workloads;

/// A unit of CPU work that reports how much it did.
///
/// Must be callable repeatedly without reset. Randomness should come from
/// [`crate::ambient`] so trials are reproducible.
pub trait Workload: Send + Sync {
    fn run(&self) -> std::result::Result<f64, WorkloadError>;
}

impl<F> Workload for F
where
    F: Fn() -> std::result::Result<f64, WorkloadError> + Send + Sync,
{
    fn run(&self) -> std::result::Result<f64, WorkloadError> {
        self()
    }
}

/// Selects the trial count a workload gets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrialClass {
    #[default]
    Standard,
    /// Image-sized workloads; slow enough that fewer trials are run.
    Heavy,
}

#[derive(Clone)]
pub struct WorkloadSpec {
    pub id: String,
    pub display_name: String,
    pub unit: String,
    /// Rate that scores exactly `reference_score`.
    pub reference_rate: f64,
    pub reference_score: u32,
    pub class: TrialClass,
    pub workload: Arc<dyn Workload>,
}

impl WorkloadSpec {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        unit: impl Into<String>,
        reference_rate: f64,
        reference_score: u32,
        workload: impl Workload + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            unit: unit.into(),
            reference_rate,
            reference_score,
            class: TrialClass::Standard,
            workload: Arc::new(workload),
        }
    }

    pub fn heavy(mut self) -> Self {
        self.class = TrialClass::Heavy;
        self
    }

    /// Unscaled score for a measured rate: `(rate / reference_rate) * reference_score`.
    pub fn raw_score(&self, rate: f64) -> f64 {
        (rate / self.reference_rate) * f64::from(self.reference_score)
    }
}

impl fmt::Debug for WorkloadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadSpec")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("unit", &self.unit)
            .field("reference_rate", &self.reference_rate)
            .field("reference_score", &self.reference_score)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// Ordered, validated set of workloads.
///
/// Order drives execution and reporting only; it does not affect scores.
#[derive(Clone, Debug)]
pub struct Registry {
    specs: Vec<WorkloadSpec>,
}

impl Registry {
    pub fn new(specs: Vec<WorkloadSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(BenchError::InvalidRegistry("no workloads".into()));
        }

        let mut seen = HashSet::with_capacity(specs.len());
        for spec in &specs {
            if !seen.insert(spec.id.as_str()) {
                return Err(BenchError::InvalidRegistry(format!(
                    "duplicate workload id `{}`",
                    spec.id
                )));
            }
            if !(spec.reference_rate.is_finite() && spec.reference_rate > 0.0) {
                return Err(BenchError::InvalidRegistry(format!(
                    "`{}` has non-positive reference rate {}",
                    spec.id, spec.reference_rate
                )));
            }
            if spec.reference_score == 0 {
                return Err(BenchError::InvalidRegistry(format!(
                    "`{}` has zero reference score",
                    spec.id
                )));
            }
        }

        Ok(Self { specs })
    }

    pub fn list(&self) -> &[WorkloadSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&WorkloadSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    /// Subset of this registry, keeping registry order.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self> {
        for id in ids {
            if self.get(id.as_ref()).is_none() {
                return Err(BenchError::UnknownWorkload(id.as_ref().to_string()));
            }
        }
        let specs = self
            .specs
            .iter()
            .filter(|s| ids.iter().any(|id| id.as_ref() == s.id))
            .cloned()
            .collect();
        Self::new(specs)
    }
}

static BUILTIN: Lazy<Registry> = Lazy::new(|| Registry {
    specs: builtin_specs(),
});

/// The twelve built-in workloads.
pub fn builtin() -> &'static Registry {
    &BUILTIN
}

fn builtin_specs() -> Vec<WorkloadSpec> {
    vec![
        WorkloadSpec::new("compression", "File Compression", "MB/sec", 480.9, 3349, workloads::compression),
        WorkloadSpec::new("navigation", "Navigation", "routes/sec", 20.4, 3393, workloads::navigation),
        WorkloadSpec::new("html5", "HTML5 Browser", "pages/sec", 77.9, 3803, workloads::html5),
        WorkloadSpec::new("pdf", "PDF Renderer", "Mpixels/sec", 79.6, 3453, workloads::pdf),
        WorkloadSpec::new("photo", "Photo Library", "images/sec", 45.8, 3377, workloads::photo).heavy(),
        WorkloadSpec::new("clang", "Clang", "Klines/sec", 21.7, 4411, workloads::clang),
        WorkloadSpec::new("text", "Text Processing", "pages/sec", 265.8, 3320, workloads::text),
        WorkloadSpec::new("asset", "Asset Compression", "MB/sec", 93.8, 3028, workloads::asset),
        WorkloadSpec::new("obj_detect", "Object Detection", "images/sec", 167.6, 5602, workloads::object_detection).heavy(),
        WorkloadSpec::new("blur", "Background Blur", "images/sec", 14.7, 3556, workloads::blur).heavy(),
        WorkloadSpec::new("horizon", "Horizon Detection", "Mpixels/sec", 114.8, 3689, workloads::horizon).heavy(),
        WorkloadSpec::new("remover", "Object Remover", "Mpixels/sec", 339.1, 4410, workloads::remover).heavy(),
    ]
}
