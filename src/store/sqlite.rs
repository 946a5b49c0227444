//! SQLite candidate store: WAL-mode database of upload metadata, paired with
//! the media files under the configured media root.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, params};

use crate::core::errors::{JanitorError, Result};
use crate::store::{
    CandidateFilter, CandidateStore, DeleteError, MediaRecord, find_media_files,
};

/// Durable candidate store backed by the `uploads` table.
pub struct SqliteStore {
    conn: Connection,
    media_root: PathBuf,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, applying schema and PRAGMAs.
    pub fn open(path: &Path, media_root: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| JanitorError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| JanitorError::StoreUnavailable {
            details: format!("open {}: {e}", path.display()),
        })?;

        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        Ok(Self {
            conn,
            media_root: media_root.to_path_buf(),
            path: path.to_path_buf(),
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Media root this store resolves locators under.
    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    fn query_records(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<MediaRecord>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl CandidateStore for SqliteStore {
    fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<MediaRecord>> {
        match filter {
            CandidateFilter::All => self.query_records(
                "SELECT event_id, room_id, sender, mxc_uri, mimetype, size, timestamp
                 FROM uploads",
                &[],
            ),
            CandidateFilter::OlderThan {
                image_cutoff,
                non_image_cutoff,
            } => self.query_records(
                "SELECT event_id, room_id, sender, mxc_uri, mimetype, size, timestamp
                 FROM uploads
                 WHERE (mimetype LIKE 'image/%' AND timestamp < ?1)
                    OR (mimetype NOT LIKE 'image/%' AND timestamp < ?2)",
                &[
                    &image_cutoff.timestamp_millis(),
                    &non_image_cutoff.timestamp_millis(),
                ],
            ),
        }
    }

    fn delete(&self, record: &MediaRecord) -> std::result::Result<(), DeleteError> {
        let files = find_media_files(&self.media_root, &record.locator);

        if files.is_empty() {
            // Nothing on disk: drop the orphaned row so store and filesystem
            // cannot diverge further, then report the absence.
            let _ = self.conn.execute(
                "DELETE FROM uploads WHERE event_id = ?1",
                params![record.event_id],
            );
            return Err(DeleteError::AlreadyAbsent {
                locator: record.locator.clone(),
            });
        }

        for file in &files {
            fs::remove_file(file).map_err(|source| DeleteError::Io {
                path: file.clone(),
                source,
            })?;
        }

        self.conn
            .execute(
                "DELETE FROM uploads WHERE event_id = ?1",
                params![record.event_id],
            )
            .map_err(|e| DeleteError::Store {
                event_id: record.event_id.clone(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    fn count_all(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM uploads")?
            .query_row([], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn record_upload(&self, record: &MediaRecord) -> Result<()> {
        if crate::store::parse_locator(&record.locator).is_none() {
            return Err(JanitorError::Runtime {
                details: format!("malformed content locator: {}", record.locator),
            });
        }
        self.conn
            .prepare_cached(
                "INSERT OR IGNORE INTO uploads
                   (event_id, room_id, sender, mxc_uri, mimetype, size, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?
            .execute(params![
                record.event_id,
                record.room_id,
                record.sender,
                record.locator,
                record.mime,
                i64::try_from(record.size_bytes).unwrap_or(i64::MAX),
                record.uploaded_at.timestamp_millis(),
            ])?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaRecord> {
    let size: i64 = row.get(5)?;
    let millis: i64 = row.get(6)?;
    Ok(MediaRecord {
        event_id: row.get(0)?,
        room_id: row.get(1)?,
        sender: row.get(2)?,
        locator: row.get(3)?,
        mime: row.get(4)?,
        size_bytes: u64::try_from(size).unwrap_or(0),
        uploaded_at: DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now),
    })
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS uploads (
            event_id  TEXT PRIMARY KEY,
            room_id   TEXT NOT NULL,
            sender    TEXT NOT NULL,
            mxc_uri   TEXT NOT NULL,
            mimetype  TEXT NOT NULL,
            size      INTEGER NOT NULL,
            timestamp INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_uploads_timestamp ON uploads(timestamp);",
    )?;
    Ok(())
}
