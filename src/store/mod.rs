//! Candidate store: persisted media-upload metadata plus the filesystem
//! objects the records describe.
//!
//! The store is a capability interface with two backings: [`sqlite::SqliteStore`]
//! for production and [`memory::MemoryStore`] for deterministic tests. A record
//! and its backing file are removed together — never one without the other.

#![allow(missing_docs)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::errors::Result;

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

// ──────────────────── record model ────────────────────

/// Closed MIME classification: every tracked upload is exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MimeClass {
    Image,
    NonImage,
}

impl MimeClass {
    /// Classify a raw MIME string. Anything outside `image/*` is non-image,
    /// including empty/unknown types.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else {
            Self::NonImage
        }
    }

    /// Stable label used in diagnostics payloads.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::NonImage => "non_images",
        }
    }
}

/// One tracked upload. Immutable once stored; destroyed only when the
/// corresponding deletion plan entry executes successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Chat event identifier — unique within the store.
    pub event_id: String,
    /// Room the upload was posted in.
    pub room_id: String,
    /// Uploading user.
    pub sender: String,
    /// Content locator (`mxc://<server>/<media_id>`), resolvable to one or
    /// more filesystem paths under the media root.
    pub locator: String,
    /// Raw MIME type as reported by the upload event.
    pub mime: String,
    /// Upload size in bytes.
    pub size_bytes: u64,
    /// Upload timestamp (UTC).
    pub uploaded_at: DateTime<Utc>,
}

impl MediaRecord {
    /// MIME classification of this record.
    #[must_use]
    pub fn class(&self) -> MimeClass {
        MimeClass::from_mime(&self.mime)
    }
}

// ──────────────────── locator handling ────────────────────

/// Split an `mxc://<server>/<media_id>` locator into its two components.
/// Returns `None` for anything malformed.
#[must_use]
pub fn parse_locator(locator: &str) -> Option<(&str, &str)> {
    let rest = locator.strip_prefix("mxc://")?;
    let (server, media_id) = rest.split_once('/')?;
    if server.is_empty() || media_id.is_empty() {
        return None;
    }
    Some((server, media_id))
}

/// Resolve a locator to the media files currently on disk.
///
/// Homeservers shard the repository into nested directories and store the
/// media id (or a derivative containing it) as the file name, so this walks
/// the whole media root and matches on file-name substring. A malformed
/// locator resolves to no files.
#[must_use]
pub fn find_media_files(media_root: &Path, locator: &str) -> Vec<PathBuf> {
    let Some((_, media_id)) = parse_locator(locator) else {
        return Vec::new();
    };
    let mut hits = Vec::new();
    collect_matching(media_root, media_id, &mut hits);
    hits.sort();
    hits
}

fn collect_matching(dir: &Path, media_id: &str, hits: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_matching(&path, media_id, hits);
        } else if file_type.is_file()
            && path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().contains(media_id))
        {
            hits.push(path);
        }
    }
}

// ──────────────────── store interface ────────────────────

/// Candidate-set filter for [`CandidateStore::list_candidates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateFilter {
    /// Every tracked record (pressure mode; age is irrelevant).
    All,
    /// Records older than the per-class cutoff (retention mode).
    OlderThan {
        image_cutoff: DateTime<Utc>,
        non_image_cutoff: DateTime<Utc>,
    },
}

impl CandidateFilter {
    /// Whether `record` passes this filter.
    #[must_use]
    pub fn matches(&self, record: &MediaRecord) -> bool {
        match self {
            Self::All => true,
            Self::OlderThan {
                image_cutoff,
                non_image_cutoff,
            } => {
                let cutoff = match record.class() {
                    MimeClass::Image => image_cutoff,
                    MimeClass::NonImage => non_image_cutoff,
                };
                record.uploaded_at < *cutoff
            }
        }
    }
}

/// Per-record deletion failure. All variants are soft from the engine's
/// perspective: counted, logged, never aborting the run on their own.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// No media files exist for the locator (or the record row was already
    /// gone). The tracking row is still removed so store and filesystem
    /// cannot diverge further.
    #[error("media already absent for {locator}")]
    AlreadyAbsent { locator: String },

    /// Genuine I/O failure removing a media file. No tracking-row change.
    #[error("IO failure removing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Tracking-store failure after the files were removed.
    #[error("store failure deleting {event_id}: {details}")]
    Store { event_id: String, details: String },
}

/// Read/write access to persisted upload records and their media files.
///
/// Runs are single-threaded and hold the store exclusively, so no `Sync`
/// bound is imposed (the sqlite backing is not `Sync`).
pub trait CandidateStore {
    /// Records matching `filter`, in unspecified order (the eviction selector
    /// owns ordering).
    fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<MediaRecord>>;

    /// Remove the record's media files and tracking row together.
    ///
    /// Atomic from the engine's point of view: either both are gone and the
    /// call succeeds, or it fails without removing the row (except
    /// [`DeleteError::AlreadyAbsent`], where the orphaned row is dropped).
    fn delete(&self, record: &MediaRecord) -> std::result::Result<(), DeleteError>;

    /// Total count of currently tracked records.
    fn count_all(&self) -> Result<u64>;

    /// Track a newly observed upload. Duplicate event ids are ignored
    /// (records are immutable once stored).
    fn record_upload(&self, record: &MediaRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_classification() {
        assert_eq!(MimeClass::from_mime("image/png"), MimeClass::Image);
        assert_eq!(MimeClass::from_mime("image/webp"), MimeClass::Image);
        assert_eq!(MimeClass::from_mime("video/mp4"), MimeClass::NonImage);
        assert_eq!(MimeClass::from_mime("application/pdf"), MimeClass::NonImage);
        assert_eq!(MimeClass::from_mime(""), MimeClass::NonImage);
        // No partial-prefix confusion.
        assert_eq!(MimeClass::from_mime("imagery/x"), MimeClass::NonImage);
    }

    #[test]
    fn locator_parsing_accepts_well_formed() {
        assert_eq!(
            parse_locator("mxc://example.org/AbCdEf123"),
            Some(("example.org", "AbCdEf123"))
        );
    }

    #[test]
    fn locator_parsing_rejects_malformed() {
        assert_eq!(parse_locator("https://example.org/x"), None);
        assert_eq!(parse_locator("mxc://example.org"), None);
        assert_eq!(parse_locator("mxc:///media"), None);
        assert_eq!(parse_locator("mxc://server/"), None);
        assert_eq!(parse_locator(""), None);
    }

    #[test]
    fn find_media_files_matches_nested_shards() {
        let dir = tempfile::tempdir().unwrap();
        let shard = dir.path().join("local_content").join("Ab");
        fs::create_dir_all(&shard).unwrap();
        fs::write(shard.join("AbCdEf123"), b"pixels").unwrap();
        fs::write(shard.join("AbCdEf123.thumb"), b"thumb").unwrap();
        fs::write(shard.join("unrelated"), b"other").unwrap();

        let hits = find_media_files(dir.path(), "mxc://example.org/AbCdEf123");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|p| p
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("AbCdEf123")));
    }

    #[test]
    fn find_media_files_empty_for_malformed_locator() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_media_files(dir.path(), "not-a-locator").is_empty());
    }

    #[test]
    fn filter_older_than_uses_per_class_cutoff() {
        let now = Utc::now();
        let record = MediaRecord {
            event_id: "$e1".to_string(),
            room_id: "!room:example.org".to_string(),
            sender: "@user:example.org".to_string(),
            locator: "mxc://example.org/m1".to_string(),
            mime: "image/png".to_string(),
            size_bytes: 10,
            uploaded_at: now - chrono::Duration::days(60),
        };
        // Image cutoff 90 days back: 60-day-old image is NOT a candidate.
        let filter = CandidateFilter::OlderThan {
            image_cutoff: now - chrono::Duration::days(90),
            non_image_cutoff: now - chrono::Duration::days(30),
        };
        assert!(!filter.matches(&record));

        // Same age as a non-image passes the 30-day cutoff.
        let mut non_image = record.clone();
        non_image.mime = "video/mp4".to_string();
        assert!(filter.matches(&non_image));

        assert!(CandidateFilter::All.matches(&record));
    }
}
