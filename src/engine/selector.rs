//! Eviction selector: pure candidate filtering and ordering.
//!
//! Both orderings sacrifice non-images before images. Retention then walks
//! oldest-first (largest breaking timestamp ties); pressure walks
//! largest-first (oldest breaking size ties) so the loop frees space in as
//! few deletions as possible.

#![allow(missing_docs)]

use std::cmp::Reverse;

use chrono::{DateTime, Duration, Utc};

use crate::core::config::PolicyConfig;
use crate::engine::Mode;
use crate::store::{CandidateFilter, MediaRecord, MimeClass};

/// Ordered deletion workload for one run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionPlan {
    pub mode: Mode,
    pub entries: Vec<MediaRecord>,
}

impl EvictionPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of entry sizes, for reporting what the plan could free at most.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|r| r.size_bytes).sum()
    }
}

/// Store filter matching `mode`'s candidate universe.
#[must_use]
pub fn candidate_filter(mode: Mode, policy: &PolicyConfig, now: DateTime<Utc>) -> CandidateFilter {
    match mode {
        Mode::Retention => CandidateFilter::OlderThan {
            image_cutoff: now - Duration::days(i64::from(policy.image_retention_days)),
            non_image_cutoff: now - Duration::days(i64::from(policy.non_image_retention_days)),
        },
        // Pressure mode may sacrifice any record regardless of age.
        Mode::Pressure => CandidateFilter::All,
    }
}

/// Keep only records past their per-class retention cutoff.
#[must_use]
pub fn retention_candidates(
    records: Vec<MediaRecord>,
    policy: &PolicyConfig,
    now: DateTime<Utc>,
) -> Vec<MediaRecord> {
    let filter = candidate_filter(Mode::Retention, policy, now);
    records.into_iter().filter(|r| filter.matches(r)).collect()
}

fn class_rank(record: &MediaRecord) -> u8 {
    match record.class() {
        MimeClass::NonImage => 0,
        MimeClass::Image => 1,
    }
}

/// Non-image first, oldest first, largest first on timestamp tie.
pub fn order_for_retention(records: &mut [MediaRecord]) {
    records.sort_by(|a, b| {
        (class_rank(a), a.uploaded_at, Reverse(a.size_bytes), &a.event_id).cmp(&(
            class_rank(b),
            b.uploaded_at,
            Reverse(b.size_bytes),
            &b.event_id,
        ))
    });
}

/// Non-image first, largest first, oldest first on size tie.
pub fn order_for_pressure(records: &mut [MediaRecord]) {
    records.sort_by(|a, b| {
        (class_rank(a), Reverse(a.size_bytes), a.uploaded_at, &a.event_id).cmp(&(
            class_rank(b),
            Reverse(b.size_bytes),
            b.uploaded_at,
            &b.event_id,
        ))
    });
}

/// Filter and order `records` into the deletion plan for `mode`.
///
/// Pure: same inputs always produce the same plan. Records whose backing
/// files are missing stay in the plan; the executor surfaces those as
/// soft failures at deletion time.
#[must_use]
pub fn build_plan(
    records: Vec<MediaRecord>,
    mode: Mode,
    policy: &PolicyConfig,
    now: DateTime<Utc>,
) -> EvictionPlan {
    let mut entries = match mode {
        Mode::Retention => retention_candidates(records, policy, now),
        Mode::Pressure => records,
    };
    match mode {
        Mode::Retention => order_for_retention(&mut entries),
        Mode::Pressure => order_for_pressure(&mut entries),
    }
    EvictionPlan { mode, entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(event_id: &str, mime: &str, size: u64, age_days: i64) -> MediaRecord {
        MediaRecord {
            event_id: event_id.to_string(),
            room_id: "!room:example.org".to_string(),
            sender: "@user:example.org".to_string(),
            locator: format!("mxc://example.org/{event_id}"),
            mime: mime.to_string(),
            size_bytes: size,
            uploaded_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn empty_input_builds_empty_plan() {
        let plan = build_plan(vec![], Mode::Pressure, &PolicyConfig::default(), Utc::now());
        assert!(plan.is_empty());
        assert_eq!(plan.total_bytes(), 0);
    }

    #[test]
    fn retention_plan_drops_records_inside_window() {
        let records = vec![
            record("$old-img", "image/png", 10, 120),
            record("$new-img", "image/png", 10, 30),
            record("$old-vid", "video/mp4", 10, 45),
            record("$new-vid", "video/mp4", 10, 5),
        ];
        let plan = build_plan(
            records,
            Mode::Retention,
            &PolicyConfig::default(),
            Utc::now(),
        );
        let ids: Vec<&str> = plan.entries.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["$old-vid", "$old-img"]);
    }

    #[test]
    fn retention_ordering_is_class_then_age_then_size() {
        let mut records = vec![
            record("$img-old", "image/png", 100, 200),
            record("$vid-small", "video/mp4", 10, 100),
            record("$vid-big", "video/mp4", 500, 100),
            record("$vid-older", "video/mp4", 5, 150),
        ];
        // Same uploaded_at for the two 100-day records so size breaks the tie.
        let shared = Utc::now() - Duration::days(100);
        records[1].uploaded_at = shared;
        records[2].uploaded_at = shared;

        order_for_retention(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["$vid-older", "$vid-big", "$vid-small", "$img-old"]);
    }

    #[test]
    fn pressure_ordering_is_class_then_size_then_age() {
        let mut records = vec![
            record("$img-huge", "image/png", 9_000, 1),
            record("$vid-small-old", "video/mp4", 10, 300),
            record("$vid-small-new", "video/mp4", 10, 2),
            record("$doc-big", "application/pdf", 800, 1),
        ];
        order_for_pressure(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["$doc-big", "$vid-small-old", "$vid-small-new", "$img-huge"]
        );
    }

    fn arb_record() -> impl Strategy<Value = MediaRecord> {
        (
            "[a-z]{1,8}",
            prop_oneof![
                Just("image/png".to_string()),
                Just("image/jpeg".to_string()),
                Just("video/mp4".to_string()),
                Just("application/pdf".to_string()),
            ],
            0u64..10_000_000,
            0i64..400,
        )
            .prop_map(|(id, mime, size, age)| record(&format!("${id}"), &mime, size, age))
    }

    proptest! {
        #[test]
        fn pressure_plan_never_puts_an_image_before_a_non_image(
            records in proptest::collection::vec(arb_record(), 0..40)
        ) {
            let plan = build_plan(records, Mode::Pressure, &PolicyConfig::default(), Utc::now());
            let first_image = plan.entries.iter().position(|r| r.class() == MimeClass::Image);
            if let Some(split) = first_image {
                prop_assert!(
                    plan.entries[split..].iter().all(|r| r.class() == MimeClass::Image)
                );
            }
        }

        #[test]
        fn pressure_sizes_are_non_increasing_within_a_class(
            records in proptest::collection::vec(arb_record(), 0..40)
        ) {
            let plan = build_plan(records, Mode::Pressure, &PolicyConfig::default(), Utc::now());
            for pair in plan.entries.windows(2) {
                if pair[0].class() == pair[1].class() {
                    prop_assert!(pair[0].size_bytes >= pair[1].size_bytes);
                }
            }
        }

        #[test]
        fn plan_building_is_deterministic(
            records in proptest::collection::vec(arb_record(), 0..40)
        ) {
            let now = Utc::now();
            let policy = PolicyConfig::default();
            let a = build_plan(records.clone(), Mode::Retention, &policy, now);
            let b = build_plan(records, Mode::Retention, &policy, now);
            prop_assert_eq!(a, b);
        }
    }
}
