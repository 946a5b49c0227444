//! Notification dedup: content fingerprints and the send/suppress gate.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::core::errors::{JanitorError, Result};
use crate::engine::diagnostics::RunDiagnostics;
use crate::engine::Mode;

/// SHA-256 hex fingerprint over the stable fields of a run's diagnostics.
///
/// Wall-clock values and elapsed duration are excluded, and usage fractions
/// are rounded to a tenth of a percent, so two materially identical runs
/// fingerprint identically. Key order is canonical (serde_json sorts map
/// keys), keeping the digest stable across releases.
#[must_use]
pub fn fingerprint(diag: &RunDiagnostics) -> String {
    let pct = |usage: Option<f64>| usage.map(|u| (u * 1000.0).round() / 10.0);
    let payload = serde_json::json!({
        "mode": diag.mode.label(),
        "dry_run": diag.dry_run,
        "candidate_count": diag.candidate_count,
        "deleted_count": diag.deleted_count,
        "deleted_images": diag.deleted_images,
        "deleted_non_images": diag.deleted_non_images,
        "soft_failures": diag.soft_failures,
        "bytes_freed": diag.bytes_freed,
        "usage_before_pct": pct(diag.usage_before),
        "usage_after_pct": pct(diag.usage_after),
        "pressure_threshold": diag.pressure_threshold,
        "emergency_threshold": diag.emergency_threshold,
    });
    // Serializing a Value cannot fail; the fallback keeps this infallible.
    let canonical = serde_json::to_string(&payload).unwrap_or_default();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

/// Outcome of the send/suppress decision. `fingerprint` is always populated
/// so callers can persist it after a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub send: bool,
    pub fingerprint: String,
    pub reason: &'static str,
}

/// Decides whether a run summary is worth sending.
///
/// The gate itself never errors: an unreadable previous fingerprint simply
/// arrives as `None` and the decision leans toward sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupGate {
    /// Send summaries even for runs that deleted nothing.
    pub send_zero: bool,
    /// Operator override: bypass both the zero-deletion gate and the
    /// duplicate-fingerprint gate.
    pub notify_anyway: bool,
}

impl DedupGate {
    #[must_use]
    pub fn should_notify(&self, diag: &RunDiagnostics, previous: Option<&str>) -> GateDecision {
        let fingerprint = fingerprint(diag);

        if self.notify_anyway {
            return GateDecision {
                send: true,
                fingerprint,
                reason: "override requested",
            };
        }
        if previous == Some(fingerprint.as_str()) {
            return GateDecision {
                send: false,
                fingerprint,
                reason: "unchanged since last notification",
            };
        }
        if diag.deleted_count > 0 {
            return GateDecision {
                send: true,
                fingerprint,
                reason: "deletions performed",
            };
        }
        if diag.dry_run {
            return GateDecision {
                send: true,
                fingerprint,
                reason: "dry run report",
            };
        }
        if self.send_zero {
            return GateDecision {
                send: true,
                fingerprint,
                reason: "zero-deletion summaries enabled",
            };
        }
        GateDecision {
            send: false,
            fingerprint,
            reason: "nothing deleted",
        }
    }
}

/// Per-mode fingerprint persistence under the state directory.
///
/// One file per mode (`{mode}_last.fp`), overwritten atomically via a temp
/// file and rename. Callers read before deciding and write after sending.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    state_dir: PathBuf,
}

impl FingerprintStore {
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
        }
    }

    fn path_for(&self, mode: Mode) -> PathBuf {
        self.state_dir.join(format!("{}_last.fp", mode.label()))
    }

    /// Last persisted fingerprint for `mode`. Any read failure (missing
    /// file included) reads as "no previous fingerprint".
    #[must_use]
    pub fn load(&self, mode: Mode) -> Option<String> {
        let raw = fs::read_to_string(self.path_for(mode)).ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Persist `fingerprint` for `mode`, replacing any previous value.
    pub fn store(&self, mode: Mode, fingerprint: &str) -> Result<()> {
        fs::create_dir_all(&self.state_dir)
            .map_err(|source| JanitorError::io(&self.state_dir, source))?;
        let target = self.path_for(mode);
        let tmp = target.with_extension("fp.tmp");
        fs::write(&tmp, fingerprint).map_err(|source| JanitorError::io(&tmp, source))?;
        fs::rename(&tmp, &target).map_err(|source| JanitorError::io(&target, source))?;
        Ok(())
    }
}
