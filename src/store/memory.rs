//! In-memory candidate store for deterministic tests.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::core::errors::{JanitorError, Result};
use crate::store::{CandidateFilter, CandidateStore, DeleteError, MediaRecord};

/// Scripted failure injected into [`MemoryStore::delete`] for a specific record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    AlreadyAbsent,
    Io,
}

/// In-memory store variant. Holds records in a `Mutex`-guarded map and lets
/// tests inject per-record deletion failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, MediaRecord>>,
    failures: Mutex<HashMap<String, InjectedFailure>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `records`.
    #[must_use]
    pub fn with_records(records: Vec<MediaRecord>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.records.lock().expect("fresh mutex");
            for record in records {
                guard.insert(record.event_id.clone(), record);
            }
        }
        store
    }

    /// Make `delete` fail for `event_id` with the given failure kind.
    pub fn inject_failure(&self, event_id: &str, failure: InjectedFailure) {
        self.failures
            .lock()
            .expect("failures mutex")
            .insert(event_id.to_string(), failure);
    }

    /// Remaining record count (test assertion helper).
    pub fn len(&self) -> usize {
        self.records.lock().expect("records mutex").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `event_id` is still tracked.
    pub fn contains(&self, event_id: &str) -> bool {
        self.records
            .lock()
            .expect("records mutex")
            .contains_key(event_id)
    }
}

impl CandidateStore for MemoryStore {
    fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<MediaRecord>> {
        let guard = self
            .records
            .lock()
            .map_err(|_| JanitorError::StoreUnavailable {
                details: "memory store poisoned".to_string(),
            })?;
        Ok(guard
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn delete(&self, record: &MediaRecord) -> std::result::Result<(), DeleteError> {
        let injected = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&record.event_id).copied());
        match injected {
            Some(InjectedFailure::Io) => {
                return Err(DeleteError::Io {
                    path: PathBuf::from(&record.locator),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected"),
                });
            }
            Some(InjectedFailure::AlreadyAbsent) => {
                // Row is still dropped, mirroring the durable backend.
                if let Ok(mut guard) = self.records.lock() {
                    guard.remove(&record.event_id);
                }
                return Err(DeleteError::AlreadyAbsent {
                    locator: record.locator.clone(),
                });
            }
            None => {}
        }

        let mut guard = self.records.lock().map_err(|_| DeleteError::Store {
            event_id: record.event_id.clone(),
            details: "memory store poisoned".to_string(),
        })?;
        if guard.remove(&record.event_id).is_none() {
            return Err(DeleteError::AlreadyAbsent {
                locator: record.locator.clone(),
            });
        }
        Ok(())
    }

    fn count_all(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }

    fn record_upload(&self, record: &MediaRecord) -> Result<()> {
        if crate::store::parse_locator(&record.locator).is_none() {
            return Err(JanitorError::Runtime {
                details: format!("malformed content locator: {}", record.locator),
            });
        }
        let mut guard = self
            .records
            .lock()
            .map_err(|_| JanitorError::StoreUnavailable {
                details: "memory store poisoned".to_string(),
            })?;
        guard
            .entry(record.event_id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(event_id: &str, mime: &str) -> MediaRecord {
        MediaRecord {
            event_id: event_id.to_string(),
            room_id: "!room:example.org".to_string(),
            sender: "@user:example.org".to_string(),
            locator: format!("mxc://example.org/{event_id}"),
            mime: mime.to_string(),
            size_bytes: 100,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn record_upload_ignores_duplicates() {
        let store = MemoryStore::new();
        let r = record("$e1", "image/png");
        store.record_upload(&r).unwrap();
        let mut dup = r.clone();
        dup.size_bytes = 999;
        store.record_upload(&dup).unwrap();
        assert_eq!(store.count_all().unwrap(), 1);
        let listed = store.list_candidates(&CandidateFilter::All).unwrap();
        assert_eq!(listed[0].size_bytes, 100, "first write wins");
    }

    #[test]
    fn record_upload_rejects_malformed_locator() {
        let store = MemoryStore::new();
        let mut r = record("$e1", "image/png");
        r.locator = "not-a-locator".to_string();
        assert!(store.record_upload(&r).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn delete_removes_record() {
        let store = MemoryStore::with_records(vec![record("$e1", "image/png")]);
        let r = record("$e1", "image/png");
        store.delete(&r).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn delete_of_unknown_record_is_already_absent() {
        let store = MemoryStore::new();
        let err = store.delete(&record("$ghost", "image/png")).unwrap_err();
        assert!(matches!(err, DeleteError::AlreadyAbsent { .. }));
    }

    #[test]
    fn injected_io_failure_keeps_record() {
        let store = MemoryStore::with_records(vec![record("$e1", "image/png")]);
        store.inject_failure("$e1", InjectedFailure::Io);
        let err = store.delete(&record("$e1", "image/png")).unwrap_err();
        assert!(matches!(err, DeleteError::Io { .. }));
        assert!(store.contains("$e1"), "IO failure must not remove the row");
    }

    #[test]
    fn injected_absence_drops_row() {
        let store = MemoryStore::with_records(vec![record("$e1", "image/png")]);
        store.inject_failure("$e1", InjectedFailure::AlreadyAbsent);
        let err = store.delete(&record("$e1", "image/png")).unwrap_err();
        assert!(matches!(err, DeleteError::AlreadyAbsent { .. }));
        assert!(!store.contains("$e1"), "orphaned row must be dropped");
    }
}
