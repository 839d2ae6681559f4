//! SQLite snapshot store
//!
//! Append-only storage for [`SnapshotRecord`]s. Rows are only ever inserted
//! or deleted, never updated.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{CaptureOutcome, SnapshotRecord};
use crate::pipeline::DuplicateLookup;
use crate::storage::schema::{init_schema, needs_init};

/// How long a writer waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const METADATA_COLUMNS: &str = "id, link_id, created_by, mime_type, size_original, \
     size_compressed, compression, checksum, content_hash, encoding, last_modified, \
     etag, created_at";

/// SQLite-backed snapshot storage
///
/// The connection sits behind a mutex so one store can be shared by
/// captures running on different threads.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    /// Open or create the database under the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_path(&config.sqlite_path())
    }

    /// Open or create the database at `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        if needs_init(&conn) {
            init_schema(&conn).context("Failed to initialize SQLite schema")?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Snapshot store connection lock poisoned"))
    }

    /// Insert a record unconditionally, returning its new id
    pub fn insert(&self, record: &SnapshotRecord) -> Result<i64> {
        let id = insert_row(&*self.conn()?, record)?;
        debug!("Stored snapshot {} for link {}", id, record.link_id);
        Ok(id)
    }

    /// Insert a record unless the link already has one with the same
    /// content hash
    ///
    /// The check and the insert run in one write transaction, so two
    /// concurrent captures of identical content store it only once.
    pub fn insert_unless_duplicate(&self, mut record: SnapshotRecord) -> Result<CaptureOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = latest_by_hash(&tx, record.link_id, &record.content_hash)? {
            debug!(
                "Snapshot {:?} already holds {} for link {}",
                existing.id, record.content_hash, record.link_id
            );
            let content_hash = record.content_hash;
            return Ok(CaptureOutcome::Duplicate {
                existing,
                content_hash,
            });
        }

        let id = insert_row(&tx, &record)?;
        tx.commit()?;

        debug!("Stored snapshot {} for link {}", id, record.link_id);
        record.id = Some(id);
        Ok(CaptureOutcome::Created(record))
    }

    /// Get a snapshot, including its stored content
    pub fn get(&self, id: i64) -> Result<Option<SnapshotRecord>> {
        let sql = format!(
            "SELECT {}, content FROM snapshots WHERE id = ?",
            METADATA_COLUMNS
        );
        let row = self
            .conn()?
            .query_row(&sql, params![id], |row| SnapshotRow::from_row(row, true))
            .optional()?;
        row.map(SnapshotRow::into_record).transpose()
    }

    /// All snapshots of a link, most recent first, without content
    pub fn list_for_link(&self, link_id: Uuid) -> Result<Vec<SnapshotRecord>> {
        let sql = format!(
            "SELECT {} FROM snapshots WHERE link_id = ? ORDER BY created_at DESC, id DESC",
            METADATA_COLUMNS
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![link_id.to_string()], |row| {
                SnapshotRow::from_row(row, false)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(SnapshotRow::into_record).collect()
    }

    /// Most recent snapshot of a link with the given content hash
    pub fn find_latest_by_hash(
        &self,
        link_id: Uuid,
        content_hash: &str,
    ) -> Result<Option<SnapshotRecord>> {
        latest_by_hash(&*self.conn()?, link_id, content_hash)
    }

    /// Delete a snapshot; returns whether it existed
    pub fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM snapshots WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// Total number of stored snapshots
    pub fn count(&self) -> Result<i64> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

impl DuplicateLookup for SnapshotStore {
    fn find_duplicate(&self, link_id: Uuid, content_hash: &str) -> Result<Option<SnapshotRecord>> {
        self.find_latest_by_hash(link_id, content_hash)
    }
}

// ==================== Private helpers ====================

fn insert_row(conn: &Connection, record: &SnapshotRecord) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO snapshots (
            link_id, created_by, mime_type, size_original, size_compressed,
            compression, checksum, content_hash, encoding, last_modified,
            etag, content, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            record.link_id.to_string(),
            record.created_by,
            record.mime_type,
            record.size_original as i64,
            record.size_compressed as i64,
            record.compression,
            record.checksum,
            record.content_hash,
            record.encoding,
            record.last_modified.map(|t| t.timestamp_millis()),
            record.etag,
            record.content,
            record.created_at.timestamp_millis(),
        ],
    )
    .context("Failed to insert snapshot")?;
    Ok(conn.last_insert_rowid())
}

fn latest_by_hash(
    conn: &Connection,
    link_id: Uuid,
    content_hash: &str,
) -> Result<Option<SnapshotRecord>> {
    let sql = format!(
        "SELECT {} FROM snapshots WHERE link_id = ? AND content_hash = ? \
         ORDER BY created_at DESC, id DESC LIMIT 1",
        METADATA_COLUMNS
    );
    let row = conn
        .query_row(&sql, params![link_id.to_string(), content_hash], |row| {
            SnapshotRow::from_row(row, false)
        })
        .optional()?;
    row.map(SnapshotRow::into_record).transpose()
}

/// Raw snapshot row before type conversion
struct SnapshotRow {
    id: i64,
    link_id: String,
    created_by: String,
    mime_type: String,
    size_original: i64,
    size_compressed: i64,
    compression: String,
    checksum: String,
    content_hash: String,
    encoding: Option<String>,
    last_modified: Option<i64>,
    etag: Option<String>,
    created_at: i64,
    content: Vec<u8>,
}

impl SnapshotRow {
    /// Read the metadata columns, plus `content` when it was selected
    fn from_row(row: &Row<'_>, with_content: bool) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            link_id: row.get(1)?,
            created_by: row.get(2)?,
            mime_type: row.get(3)?,
            size_original: row.get(4)?,
            size_compressed: row.get(5)?,
            compression: row.get(6)?,
            checksum: row.get(7)?,
            content_hash: row.get(8)?,
            encoding: row.get(9)?,
            last_modified: row.get(10)?,
            etag: row.get(11)?,
            created_at: row.get(12)?,
            content: if with_content { row.get(13)? } else { Vec::new() },
        })
    }

    fn into_record(self) -> Result<SnapshotRecord> {
        let link_id = Uuid::parse_str(&self.link_id)
            .with_context(|| format!("Invalid UUID: {}", self.link_id))?;

        Ok(SnapshotRecord {
            id: Some(self.id),
            link_id,
            created_by: self.created_by,
            mime_type: self.mime_type,
            size_original: self.size_original.max(0) as u64,
            size_compressed: self.size_compressed.max(0) as u64,
            compression: self.compression,
            checksum: self.checksum,
            content_hash: self.content_hash,
            encoding: self.encoding,
            last_modified: self.last_modified.and_then(DateTime::from_timestamp_millis),
            etag: self.etag,
            content: self.content,
            created_at: DateTime::from_timestamp_millis(self.created_at).unwrap_or_else(Utc::now),
        })
    }
}
