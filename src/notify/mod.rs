//! Notification boundary: run-summary rendering, send/redact traits, and the
//! dedup gate that decides whether a summary goes out at all.
//!
//! The real chat client lives outside this crate. Everything here talks to it
//! through [`ChatSender`] and [`EventRedactor`]; the shipped implementations
//! cover local operation (stdout) and an append-only JSONL outbox.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::core::errors::{JanitorError, Result};
use crate::engine::diagnostics::RunDiagnostics;
use crate::engine::Mode;

pub mod dedup;

// ──────────────────── boundary traits ────────────────────

/// Posts a text message into a chat room.
pub trait ChatSender: Send + Sync {
    fn send_text(&self, room_id: &str, body: &str) -> Result<()>;
}

/// Redacts a chat event after its media was evicted.
pub trait EventRedactor: Send + Sync {
    fn redact(&self, room_id: &str, event_id: &str, reason: &str) -> Result<()>;
}

/// Optional prose prefix prepended to a run summary. Whether the prefix is
/// accurate is the collaborator's problem; this crate only splices it in.
pub trait PrefixSource: Send + Sync {
    fn render(&self, diag: &RunDiagnostics) -> Option<String>;
}

/// Default prefix source: no prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrefix;

impl PrefixSource for NoPrefix {
    fn render(&self, _diag: &RunDiagnostics) -> Option<String> {
        None
    }
}

/// Redactor that does nothing, for deployments without chat-side cleanup.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRedactor;

impl EventRedactor for NoopRedactor {
    fn redact(&self, _room_id: &str, _event_id: &str, _reason: &str) -> Result<()> {
        Ok(())
    }
}

// ──────────────────── shipped senders ────────────────────

/// Prints summaries to stdout, tagged with the target room.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSender;

impl ChatSender for StdoutSender {
    fn send_text(&self, room_id: &str, body: &str) -> Result<()> {
        println!("[{room_id}]\n{body}");
        Ok(())
    }
}

/// Appends every sent notification to a JSONL file.
#[derive(Debug, Clone)]
pub struct OutboxSender {
    path: PathBuf,
}

impl OutboxSender {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ChatSender for OutboxSender {
    fn send_text(&self, room_id: &str, body: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| JanitorError::io(parent, source))?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .map_err(|source| JanitorError::io(&self.path, source))?;

        let line = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "room_id": room_id,
            "body": body,
        });
        writeln!(file, "{line}").map_err(|source| JanitorError::io(&self.path, source))?;
        Ok(())
    }
}

// ──────────────────── summary rendering ────────────────────

/// Render a run summary as deterministic field-labeled lines.
///
/// Pressure runs carry the disk-usage line and status label; retention runs
/// have no usage observations so those lines are omitted.
#[must_use]
pub fn render_summary(diag: &RunDiagnostics, prefix: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(prefix) = prefix {
        let _ = writeln!(out, "{prefix}");
    }

    let header = match diag.mode {
        Mode::Retention => "Retention sweep",
        Mode::Pressure => "Pressure sweep",
    };
    let dry = if diag.dry_run { " (dry run)" } else { "" };
    let _ = writeln!(out, "{header}{dry} — {}", diag.outcome());

    if let (Some(before), Some(after)) = (diag.usage_before, diag.usage_after) {
        let _ = writeln!(
            out,
            "Disk usage: {:.1}% -> {:.1}% (pressure threshold {:.1}%)",
            before * 100.0,
            after * 100.0,
            diag.pressure_threshold * 100.0
        );
        if let Some(status) = diag.storage_status() {
            let _ = writeln!(out, "Storage status: {status}");
        }
    }

    if diag.dry_run {
        let _ = writeln!(out, "Planned: {} file(s)", diag.candidate_count);
    } else {
        let _ = writeln!(
            out,
            "Deleted: {} file(s) ({} images, {} non-images)",
            diag.deleted_count, diag.deleted_images, diag.deleted_non_images
        );
        let _ = writeln!(out, "Freed: {:.2} GB", diag.freed_gb());
    }
    if diag.soft_failures > 0 {
        let _ = writeln!(out, "Soft failures: {}", diag.soft_failures);
    }
    let _ = writeln!(out, "Tracked files remaining: {}", diag.total_files_after);
    #[allow(clippy::cast_precision_loss)]
    let _ = write!(out, "Duration: {:.1} s", diag.elapsed_ms as f64 / 1000.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(mode: Mode, deleted: u64, dry_run: bool) -> RunDiagnostics {
        RunDiagnostics {
            mode,
            dry_run,
            candidate_count: 5,
            deleted_count: deleted,
            deleted_images: 1,
            deleted_non_images: deleted.saturating_sub(1),
            soft_failures: 0,
            bytes_freed: 2_500_000_000,
            usage_before: (mode == Mode::Pressure).then_some(0.90),
            usage_after: (mode == Mode::Pressure).then_some(0.84),
            pressure_threshold: 0.85,
            emergency_threshold: 0.92,
            elapsed_ms: 3_400,
            total_files_after: 420,
        }
    }

    #[test]
    fn retention_summary_omits_disk_lines() {
        let text = render_summary(&diag(Mode::Retention, 3, false), None);
        assert!(text.starts_with("Retention sweep — cleanup performed"));
        assert!(!text.contains("Disk usage"));
        assert!(text.contains("Deleted: 3 file(s) (1 images, 2 non-images)"));
        assert!(text.contains("Freed: 2.50 GB"));
        assert!(text.contains("Tracked files remaining: 420"));
        assert!(text.contains("Duration: 3.4 s"));
    }

    #[test]
    fn pressure_summary_includes_usage_and_status() {
        let text = render_summary(&diag(Mode::Pressure, 3, false), None);
        assert!(text.contains("Disk usage: 90.0% -> 84.0% (pressure threshold 85.0%)"));
        assert!(text.contains("Storage status: tight"));
    }

    #[test]
    fn dry_run_summary_reports_plan_not_deletions() {
        let text = render_summary(&diag(Mode::Pressure, 0, true), None);
        assert!(text.contains("(dry run)"));
        assert!(text.contains("Planned: 5 file(s)"));
        assert!(!text.contains("Deleted:"));
    }

    #[test]
    fn prefix_is_spliced_in_front() {
        let text = render_summary(&diag(Mode::Retention, 0, false), Some("All quiet."));
        assert!(text.starts_with("All quiet.\n"));
    }

    #[test]
    fn soft_failures_line_only_when_present() {
        let mut d = diag(Mode::Retention, 3, false);
        assert!(!render_summary(&d, None).contains("Soft failures"));
        d.soft_failures = 2;
        assert!(render_summary(&d, None).contains("Soft failures: 2"));
    }

    #[test]
    fn outbox_sender_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox").join("sent.jsonl");
        let sender = OutboxSender::new(&path);
        sender.send_text("!ops:example.org", "first").unwrap();
        sender.send_text("!ops:example.org", "second").unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["room_id"], "!ops:example.org");
            assert!(value["timestamp"].as_str().unwrap().contains('T'));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
