//! Eviction executor: walks an eviction plan against the live store and disk.

#![allow(missing_docs)]

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::core::config::PolicyConfig;
use crate::core::errors::Result;
use crate::engine::diagnostics::RunDiagnostics;
use crate::engine::selector::{EvictionPlan, build_plan, candidate_filter};
use crate::engine::Mode;
use crate::monitor::disk::DiskInspector;
use crate::notify::EventRedactor;
use crate::store::{CandidateStore, MediaRecord, MimeClass};

/// Running tallies for one sweep, folded into [`RunDiagnostics`] at the end.
#[derive(Debug, Default)]
struct Tally {
    deleted: u64,
    deleted_images: u64,
    deleted_non_images: u64,
    soft_failures: u64,
    bytes_freed: u64,
}

/// Drives a single sweep: selection, deletion (or simulation), diagnostics.
///
/// Borrows its collaborators; owns no state between runs. One executor per
/// invocation is the expected usage.
pub struct EvictionExecutor<'a> {
    store: &'a dyn CandidateStore,
    disk: &'a dyn DiskInspector,
    redactor: Option<&'a dyn EventRedactor>,
    policy: PolicyConfig,
    media_root: &'a Path,
    dry_run: bool,
}

impl<'a> EvictionExecutor<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn CandidateStore,
        disk: &'a dyn DiskInspector,
        policy: PolicyConfig,
        media_root: &'a Path,
    ) -> Self {
        Self {
            store,
            disk,
            redactor: None,
            policy,
            media_root,
            dry_run: false,
        }
    }

    /// Attach a chat-side redaction hook, invoked after each successful
    /// deletion. Redaction failures are logged and never fail the run.
    #[must_use]
    pub fn with_redactor(mut self, redactor: &'a dyn EventRedactor) -> Self {
        self.redactor = Some(redactor);
        self
    }

    /// Simulate: build the identical plan but perform no deletions.
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Execute one sweep in `mode`, evaluated against `now`.
    pub fn run(&self, mode: Mode, now: DateTime<Utc>) -> Result<RunDiagnostics> {
        let started = Instant::now();
        match mode {
            Mode::Retention => self.run_retention(now, started),
            Mode::Pressure => self.run_pressure(now, started),
        }
    }

    fn run_retention(&self, now: DateTime<Utc>, started: Instant) -> Result<RunDiagnostics> {
        let filter = candidate_filter(Mode::Retention, &self.policy, now);
        let records = self.store.list_candidates(&filter)?;
        let plan = build_plan(records, Mode::Retention, &self.policy, now);
        eprintln!(
            "[CMJ-RUN] retention sweep: {} candidate(s){}",
            plan.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut tally = Tally::default();
        if !self.dry_run {
            for record in &plan.entries {
                self.delete_one(record, "retention window elapsed", &mut tally);
            }
        }
        self.finalize(&plan, tally, None, None, started)
    }

    fn run_pressure(&self, now: DateTime<Utc>, started: Instant) -> Result<RunDiagnostics> {
        // The initial reading is load-bearing: without it there is no way to
        // tell whether pressure eviction should engage at all.
        let usage_before = self.disk.usage_fraction(self.media_root)?;
        let threshold = self.policy.pressure_threshold;

        if usage_before <= threshold {
            eprintln!(
                "[CMJ-RUN] pressure sweep: usage {:.1}% at or below threshold {:.1}%, nothing to do",
                usage_before * 100.0,
                threshold * 100.0
            );
            let plan = EvictionPlan {
                mode: Mode::Pressure,
                entries: Vec::new(),
            };
            return self.finalize(
                &plan,
                Tally::default(),
                Some(usage_before),
                Some(usage_before),
                started,
            );
        }

        let records = self
            .store
            .list_candidates(&candidate_filter(Mode::Pressure, &self.policy, now))?;
        let plan = build_plan(records, Mode::Pressure, &self.policy, now);
        eprintln!(
            "[CMJ-RUN] pressure sweep: usage {:.1}% above threshold {:.1}%, {} candidate(s){}",
            usage_before * 100.0,
            threshold * 100.0,
            plan.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        if self.dry_run {
            return self.finalize(
                &plan,
                Tally::default(),
                Some(usage_before),
                Some(usage_before),
                started,
            );
        }

        let mut tally = Tally::default();
        let mut last_usage = usage_before;
        for record in &plan.entries {
            let reason = if last_usage >= self.policy.emergency_threshold {
                "emergency disk pressure"
            } else {
                "disk pressure"
            };
            self.delete_one(record, reason, &mut tally);

            // Fresh reading before any further deletion. A query failure
            // here stops the loop but keeps what the run achieved so far.
            match self.disk.usage_fraction(self.media_root) {
                Ok(usage) => {
                    last_usage = usage;
                    if usage <= threshold {
                        break;
                    }
                }
                Err(error) => {
                    eprintln!("[CMJ-RUN] usage re-query failed mid-loop, stopping: {error}");
                    break;
                }
            }
        }

        if last_usage > threshold {
            eprintln!(
                "[CMJ-RUN] candidates exhausted with usage {:.1}% still above threshold",
                last_usage * 100.0
            );
        }
        self.finalize(&plan, tally, Some(usage_before), Some(last_usage), started)
    }

    fn delete_one(&self, record: &MediaRecord, reason: &str, tally: &mut Tally) {
        match self.store.delete(record) {
            Ok(()) => {
                tally.deleted += 1;
                tally.bytes_freed += record.size_bytes;
                match record.class() {
                    MimeClass::Image => tally.deleted_images += 1,
                    MimeClass::NonImage => tally.deleted_non_images += 1,
                }
                if let Some(redactor) = self.redactor {
                    if let Err(error) = redactor.redact(&record.room_id, &record.event_id, reason) {
                        eprintln!(
                            "[CMJ-RUN] redaction failed for {}: {error}",
                            record.event_id
                        );
                    }
                }
            }
            Err(error) => {
                tally.soft_failures += 1;
                eprintln!("[CMJ-RUN] skipping {}: {error}", record.event_id);
            }
        }
    }

    fn finalize(
        &self,
        plan: &EvictionPlan,
        tally: Tally,
        usage_before: Option<f64>,
        usage_after: Option<f64>,
        started: Instant,
    ) -> Result<RunDiagnostics> {
        let total_files_after = self.store.count_all()?;
        Ok(RunDiagnostics {
            mode: plan.mode,
            dry_run: self.dry_run,
            candidate_count: plan.len() as u64,
            deleted_count: tally.deleted,
            deleted_images: tally.deleted_images,
            deleted_non_images: tally.deleted_non_images,
            soft_failures: tally.soft_failures,
            bytes_freed: tally.bytes_freed,
            usage_before,
            usage_after,
            pressure_threshold: self.policy.pressure_threshold,
            emergency_threshold: self.policy.emergency_threshold,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            total_files_after,
        })
    }
}
