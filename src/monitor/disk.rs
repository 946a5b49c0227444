//! Disk inspector: statvfs-backed usage fraction for a configured mount path.
//!
//! Deliberately uncached — the pressure loop re-observes live usage after
//! each deletion, so every call re-queries the filesystem.

#![allow(missing_docs)]

use std::path::Path;

use crate::core::errors::{JanitorError, Result};

/// Read-only view of current disk occupancy for a mount path.
pub trait DiskInspector: Send + Sync {
    /// Current usage fraction in `[0, 1]` for the filesystem holding `path`.
    fn usage_fraction(&self, path: &Path) -> Result<f64>;

    /// Total byte capacity of the filesystem holding `path`.
    fn total_bytes(&self, path: &Path) -> Result<u64>;
}

/// Unix implementation backed by `statvfs(2)`.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsInspector;

#[cfg(unix)]
impl StatvfsInspector {
    fn query(path: &Path) -> Result<nix::sys::statvfs::Statvfs> {
        if !path.exists() {
            return Err(JanitorError::DiskQuery {
                path: path.to_path_buf(),
                details: "path does not exist".to_string(),
            });
        }
        nix::sys::statvfs::statvfs(path).map_err(|error| JanitorError::DiskQuery {
            path: path.to_path_buf(),
            details: error.to_string(),
        })
    }
}

#[cfg(unix)]
impl DiskInspector for StatvfsInspector {
    fn usage_fraction(&self, path: &Path) -> Result<f64> {
        let stat = Self::query(path)?;
        let blocks = stat.blocks();
        if blocks == 0 {
            return Err(JanitorError::DiskQuery {
                path: path.to_path_buf(),
                details: "filesystem reports zero blocks".to_string(),
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let used = 1.0 - (stat.blocks_available() as f64 / blocks as f64);
        Ok(used.clamp(0.0, 1.0))
    }

    fn total_bytes(&self, path: &Path) -> Result<u64> {
        let stat = Self::query(path)?;
        Ok(stat.blocks().saturating_mul(stat.fragment_size()))
    }
}

/// Deterministic inspector for tests: replays a scripted sequence of usage
/// readings, repeating the final reading once exhausted.
#[derive(Debug)]
pub struct ScriptedInspector {
    readings: std::sync::Mutex<Vec<f64>>,
    cursor: std::sync::atomic::AtomicUsize,
    total_bytes: u64,
}

impl ScriptedInspector {
    #[must_use]
    pub fn new(readings: Vec<f64>, total_bytes: u64) -> Self {
        assert!(!readings.is_empty(), "need at least one scripted reading");
        Self {
            readings: std::sync::Mutex::new(readings),
            cursor: std::sync::atomic::AtomicUsize::new(0),
            total_bytes,
        }
    }

    /// Number of usage queries observed so far.
    pub fn queries(&self) -> usize {
        self.cursor.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl DiskInspector for ScriptedInspector {
    fn usage_fraction(&self, _path: &Path) -> Result<f64> {
        let readings = self
            .readings
            .lock()
            .map_err(|_| JanitorError::Runtime {
                details: "scripted inspector poisoned".to_string(),
            })?;
        let idx = self
            .cursor
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(readings[idx.min(readings.len() - 1)])
    }

    fn total_bytes(&self, _path: &Path) -> Result<u64> {
        Ok(self.total_bytes)
    }
}
