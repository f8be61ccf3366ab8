use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use rusqlite::{params, Connection};
use serde::Serialize;
use tidewatch_core::Sample;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::row::{from_row, tags_json, value_kind, StoredSample};
use crate::schema;

/// Outcome of a single-row insert. `DuplicateIgnored` is not an error: a
/// dedup-key conflict is the expected, successful outcome of re-delivering
/// a sample that already made it in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateIgnored,
}

#[derive(Clone, Debug, Serialize)]
pub struct StoreSizes {
    pub db_bytes: u64,
    pub wal_bytes: u64,
    pub pending_rows: u64,
}

const WAL_CHECKPOINT_INTERVAL_SECS: u64 = 3600;
const WAL_CHECKPOINT_SIZE_TRIGGER_BYTES: u64 = 64 * 1024 * 1024;
const BUSY_RETRY_ATTEMPTS: u32 = 5;
const BUSY_RETRY_BASE_MS: u64 = 20;

/// The durable store. Holds a single `rusqlite::Connection` behind a
/// std mutex; every public method runs its body inside
/// `spawn_blocking` so callers on the async runtime never block a
/// reactor thread on file I/O.
pub struct Store {
    conn: Arc<StdMutex<Connection>>,
    db_path: PathBuf,
}

impl Store {
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let path_for_blocking = db_path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            if let Some(parent) = path_for_blocking.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(&path_for_blocking)?;
            schema::migrate(&conn)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(StdMutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Runs `f` against the connection on a blocking-pool thread, retrying
    /// `SQLITE_BUSY` a bounded number of times with a short sleep before
    /// giving up — the store's own internal retry policy for transient
    /// contention, distinct from (and beneath) the uploader's backoff.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("store mutex poisoned");
            let mut attempt = 0;
            loop {
                match f(&guard) {
                    Ok(value) => return Ok(value),
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == rusqlite::ErrorCode::DatabaseBusy
                            && attempt < BUSY_RETRY_ATTEMPTS =>
                    {
                        attempt += 1;
                        std::thread::sleep(std::time::Duration::from_millis(
                            BUSY_RETRY_BASE_MS * attempt as u64,
                        ));
                    }
                    Err(rusqlite::Error::SqliteFailure(err, msg))
                        if err.code == rusqlite::ErrorCode::DatabaseBusy =>
                    {
                        return Err(StoreError::Busy(rusqlite::Error::SqliteFailure(err, msg)));
                    }
                    Err(other) => return Err(StoreError::from(other)),
                }
            }
        })
        .await?
    }

    pub async fn insert(&self, sample: Sample) -> Result<InsertOutcome> {
        let outcomes = self.insert_batch(vec![sample]).await?;
        Ok(outcomes.into_iter().next().unwrap_or(InsertOutcome::DuplicateIgnored))
    }

    /// Inserts every sample inside one transaction. A per-row unique
    /// constraint conflict is caught and mapped to `DuplicateIgnored`
    /// rather than aborting the whole batch.
    pub async fn insert_batch(&self, samples: Vec<Sample>) -> Result<Vec<InsertOutcome>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<InsertOutcome>> {
            let mut guard = conn.lock().expect("store mutex poisoned");
            let tx = guard.transaction()?;
            let mut outcomes = Vec::with_capacity(samples.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO samples
                        (dedup_key, timestamp_ms, name, value_kind, value_numeric, value_text,
                         device_id, tags_json, session_id, uploaded)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
                     ON CONFLICT(dedup_key) DO NOTHING",
                )?;
                for sample in &samples {
                    let (numeric, text) = match &sample.value {
                        tidewatch_core::MetricValue::Numeric(v) => (Some(*v), None),
                        tidewatch_core::MetricValue::Text(t) => (None, Some(t.clone())),
                    };
                    let changed = stmt.execute(params![
                        sample.dedup_key_hex(),
                        sample.timestamp_ms,
                        sample.name,
                        value_kind(&sample.value),
                        numeric,
                        text,
                        sample.device_id,
                        tags_json(&sample.tags)?,
                        sample.session_id,
                    ])?;
                    outcomes.push(if changed == 1 {
                        InsertOutcome::Inserted
                    } else {
                        InsertOutcome::DuplicateIgnored
                    });
                }
            }
            tx.commit()?;
            Ok(outcomes)
        })
        .await?
    }

    /// Returns at most `limit` unsent rows, strictly ordered by
    /// `timestamp_ms` ascending with row id as the tiebreaker.
    pub async fn read_unsent(&self, limit: usize) -> Result<Vec<StoredSample>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT row_id, timestamp_ms, name, value_kind, value_numeric, value_text,
                        device_id, tags_json, session_id, uploaded
                 FROM samples
                 WHERE uploaded = 0
                 ORDER BY timestamp_ms ASC, row_id ASC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit as i64], from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// Flips `uploaded` for exactly the given row ids, in one transaction.
    /// Calling this twice with the same ids is a no-op the second time.
    pub async fn mark_sent(&self, row_ids: Vec<i64>) -> Result<()> {
        if row_ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = conn.lock().expect("store mutex poisoned");
            let tx = guard.transaction()?;
            {
                let mut stmt = tx.prepare("UPDATE samples SET uploaded = 1 WHERE row_id = ?1")?;
                for id in &row_ids {
                    stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    pub async fn save_checkpoint(
        &self,
        batch_id: String,
        chunk_index: i64,
        accepted_count: i64,
        max_timestamp_ms: i64,
        recorded_at_ms: i64,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO upload_checkpoints
                    (batch_id, chunk_index, max_timestamp_ms, accepted_count, completed, recorded_at_ms)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)
                 ON CONFLICT(batch_id, chunk_index) DO UPDATE SET
                    max_timestamp_ms = excluded.max_timestamp_ms,
                    accepted_count = excluded.accepted_count,
                    completed = excluded.completed,
                    recorded_at_ms = excluded.recorded_at_ms",
                params![batch_id, chunk_index, max_timestamp_ms, accepted_count, recorded_at_ms],
            )?;
            Ok(())
        })
        .await
    }

    /// Deletes uploaded rows older than `retention` relative to `now_ms`.
    /// Never touches unuploaded rows, regardless of age.
    pub async fn cleanup(&self, retention_ms: i64, now_ms: i64) -> Result<u64> {
        self.with_conn(move |conn| {
            let cutoff = now_ms - retention_ms;
            let deleted = conn.execute(
                "DELETE FROM samples WHERE uploaded = 1 AND timestamp_ms < ?1",
                params![cutoff],
            )?;
            Ok(deleted as u64)
        })
        .await
    }

    pub async fn sizes(&self) -> Result<StoreSizes> {
        let db_path = self.db_path.clone();
        let pending_rows = self
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM samples WHERE uploaded = 0", [], |r| r.get(0))
            })
            .await?;

        let db_bytes = file_len(&db_path);
        let wal_bytes = file_len(&wal_path(&db_path));

        Ok(StoreSizes {
            db_bytes,
            wal_bytes,
            pending_rows,
        })
    }

    /// Folds the WAL back into the main database file. Called on a fixed
    /// schedule by the background WAL manager and once more on shutdown.
    pub async fn wal_checkpoint(&self) -> Result<()> {
        self.with_conn(|conn| conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(())))
            .await
    }

    /// Spawns the background task that checkpoints the WAL hourly and
    /// whenever it grows past the configured ceiling. Returns a handle the
    /// caller can abort on shutdown.
    pub fn spawn_wal_manager(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            let mut last_forced_checkpoint = tokio::time::Instant::now();
            loop {
                interval.tick().await;
                let sizes = match store.sizes().await {
                    Ok(sizes) => sizes,
                    Err(err) => {
                        warn!(?err, "wal manager failed to read store sizes");
                        continue;
                    }
                };
                let elapsed = last_forced_checkpoint.elapsed().as_secs();
                if sizes.wal_bytes >= WAL_CHECKPOINT_SIZE_TRIGGER_BYTES
                    || elapsed >= WAL_CHECKPOINT_INTERVAL_SECS
                {
                    debug!(wal_bytes = sizes.wal_bytes, elapsed, "running wal checkpoint");
                    if let Err(err) = store.wal_checkpoint().await {
                        warn!(?err, "wal checkpoint failed");
                    } else {
                        last_forced_checkpoint = tokio::time::Instant::now();
                    }
                }
            }
        })
    }
}

fn wal_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_owned();
    os.push("-wal");
    PathBuf::from(os)
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
