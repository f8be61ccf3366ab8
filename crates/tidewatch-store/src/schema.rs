use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Highest schema version this binary understands. Migrations are
/// forward-only: there is no downgrade path, matching the store's single
/// writer, single process model.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Applies pragmas, then runs any pending forward migrations against
/// `schema_version`. Safe to call on every open.
pub fn migrate(conn: &Connection) -> Result<()> {
    apply_pragmas(conn)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            version INTEGER NOT NULL
        );",
    )?;

    let version: i64 = conn
        .query_row("SELECT version FROM schema_version WHERE id = 0", [], |r| r.get(0))
        .unwrap_or(0);

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version < 1 {
        migrate_to_v1(conn)?;
    }

    conn.execute(
        "INSERT INTO schema_version (id, version) VALUES (0, ?1)
         ON CONFLICT(id) DO UPDATE SET version = excluded.version",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    // WAL journaling with per-transaction fsync, a bounded busy wait so
    // concurrent readers/writers coalesce instead of failing immediately,
    // in-memory temp tables, and a bounded page cache.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(5_000))?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -8_000i64)?;
    Ok(())
}

fn migrate_to_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE samples (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            dedup_key TEXT NOT NULL UNIQUE,
            timestamp_ms INTEGER NOT NULL,
            name TEXT NOT NULL,
            value_kind TEXT NOT NULL,
            value_numeric REAL,
            value_text TEXT,
            device_id TEXT NOT NULL,
            tags_json TEXT NOT NULL,
            session_id TEXT NOT NULL,
            uploaded INTEGER NOT NULL DEFAULT 0
         );
         CREATE INDEX idx_samples_timestamp ON samples (timestamp_ms);
         CREATE INDEX idx_samples_uploaded ON samples (uploaded);

         CREATE TABLE upload_checkpoints (
            batch_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            max_timestamp_ms INTEGER NOT NULL,
            accepted_count INTEGER NOT NULL,
            completed INTEGER NOT NULL,
            recorded_at_ms INTEGER NOT NULL,
            PRIMARY KEY (batch_id, chunk_index)
         );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT version FROM schema_version WHERE id = 0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute("UPDATE schema_version SET version = 99 WHERE id = 0", [])
            .unwrap();
        let err = migrate(&conn).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedSchemaVersion { .. }));
    }
}
