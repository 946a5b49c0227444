//! Run diagnostics: the immutable outcome record of a single sweep.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::engine::Mode;

/// Everything a run produced, assembled once at finalization and never
/// mutated afterwards. Feeds notification rendering and the dedup gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub mode: Mode,
    pub dry_run: bool,
    /// Entries in the eviction plan (for dry runs this is the full planned
    /// workload; deleted_count stays zero).
    pub candidate_count: u64,
    pub deleted_count: u64,
    pub deleted_images: u64,
    pub deleted_non_images: u64,
    /// Per-record failures that did not abort the run.
    pub soft_failures: u64,
    /// Sum of `size_bytes` over records actually deleted. Zero for dry runs.
    pub bytes_freed: u64,
    /// Usage fraction observed before the run. Pressure runs only.
    pub usage_before: Option<f64>,
    /// Usage fraction observed when the run finalized. Pressure runs only.
    pub usage_after: Option<f64>,
    pub pressure_threshold: f64,
    pub emergency_threshold: f64,
    pub elapsed_ms: u64,
    /// Tracked records remaining after the run.
    pub total_files_after: u64,
}

impl RunDiagnostics {
    /// One-word outcome label for summaries.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        if self.deleted_count == 0 {
            "no action"
        } else {
            "cleanup performed"
        }
    }

    /// Status label for the usage the run finished at, when known.
    #[must_use]
    pub fn storage_status(&self) -> Option<&'static str> {
        self.usage_after.map(|usage| {
            storage_status_label(
                usage * 100.0,
                self.pressure_threshold * 100.0,
                self.emergency_threshold * 100.0,
            )
        })
    }

    /// Bytes freed expressed in GB for human-facing summaries.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn freed_gb(&self) -> f64 {
        self.bytes_freed as f64 / 1_000_000_000.0
    }
}

/// Step-function severity label for a disk usage percentage.
#[must_use]
pub fn storage_status_label(
    percent: f64,
    pressure_percent: f64,
    emergency_percent: f64,
) -> &'static str {
    if percent >= emergency_percent {
        "critical"
    } else if percent >= pressure_percent {
        "pressure"
    } else if percent >= 75.0 {
        "tight"
    } else if percent >= 50.0 {
        "OK"
    } else {
        "healthy"
    }
}
