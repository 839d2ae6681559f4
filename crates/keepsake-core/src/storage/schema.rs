//! SQLite schema for snapshot storage
//!
//! Snapshots are append-only rows; content is stored as a BLOB in its
//! compressed form. Timestamps are Unix milliseconds.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Snapshots table
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            link_id TEXT NOT NULL,
            created_by TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size_original INTEGER NOT NULL,
            size_compressed INTEGER NOT NULL,
            compression TEXT NOT NULL,
            checksum TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            encoding TEXT,
            last_modified INTEGER,
            etag TEXT,
            content BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- Duplicate detection. Not UNIQUE: forced captures may store
        -- identical content again
        CREATE INDEX IF NOT EXISTS idx_snapshots_link_hash
            ON snapshots(link_id, content_hash);

        -- Listing a link's history, newest first
        CREATE INDEX IF NOT EXISTS idx_snapshots_link_created_at
            ON snapshots(link_id, created_at);
        "#,
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
