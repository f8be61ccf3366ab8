use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tidewatch_core::{meta, MetricsSink};
use tidewatch_store::{Store, StoredSample};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backoff::{compute_backoff, honor_retry_after};
use crate::client::{PostOutcome, RemoteClient};
use crate::compress::gzip;
use crate::error::Result;
use crate::wire::serialize_chunk;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

pub struct UploadConfig {
    pub upload_interval: Duration,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub max_compressed_chunk_bytes: usize,
    pub retry_attempts: u32,
    pub max_consecutive_rejections: u32,
}

pub struct Uploader {
    store: Arc<Store>,
    sink: Arc<dyn MetricsSink>,
    client: RemoteClient,
    device_id: String,
    session_id: String,
    config: UploadConfig,
    batch_counter: AtomicU64,
    rejection_counts: Mutex<HashMap<i64, u32>>,
    last_success_ms: AtomicI64,
    ever_succeeded: AtomicBool,
}

impl Uploader {
    pub fn new(
        store: Arc<Store>,
        sink: Arc<dyn MetricsSink>,
        client: RemoteClient,
        device_id: impl Into<String>,
        session_id: impl Into<String>,
        config: UploadConfig,
    ) -> Self {
        Self {
            store,
            sink,
            client,
            device_id: device_id.into(),
            session_id: session_id.into(),
            config,
            batch_counter: AtomicU64::new(0),
            rejection_counts: Mutex::new(HashMap::new()),
            last_success_ms: AtomicI64::new(now_ms()),
            ever_succeeded: AtomicBool::new(false),
        }
    }

    /// Millis since the epoch of the last chunk this uploader got fully or
    /// partially accepted. Seeded to construction time so a freshly started
    /// uploader with nothing to send isn't immediately reported as stalled.
    pub fn last_success_ms(&self) -> i64 {
        self.last_success_ms.load(Ordering::Relaxed)
    }

    /// Whether any chunk has ever been accepted (fully or partially) by
    /// this uploader instance. Used for the health endpoint's readiness
    /// gate, which is distinct from "currently healthy".
    pub fn has_succeeded(&self) -> bool {
        self.ever_succeeded.load(Ordering::Relaxed)
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let interval = self.config.upload_interval;
        tokio::spawn(async move {
            loop {
                if let Err(err) = self.run_cycle().await {
                    tracing::error!(error = %err, "upload cycle failed");
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
            }
        })
    }

    pub async fn run_cycle(&self) -> Result<()> {
        let unsent = self.store.read_unsent(self.config.batch_size).await?;
        if unsent.is_empty() {
            return Ok(());
        }

        let batch_id = format!("{}-{}", self.device_id, self.batch_counter.fetch_add(1, Ordering::Relaxed));

        // Chunks are attempted strictly in order; a chunk that exhausts its
        // retries is abandoned for this cycle but later chunks are NOT
        // attempted ahead of it, matching the ordering guarantee.
        for (chunk_index, chunk) in unsent.chunks(self.config.chunk_size).enumerate() {
            self.ship_chunk(&batch_id, chunk_index as i64, chunk).await?;
        }

        Ok(())
    }

    async fn ship_chunk(&self, batch_id: &str, chunk_index: i64, chunk: &[StoredSample]) -> Result<()> {
        for (sub, compressed) in bisect_to_budget(chunk, self.config.max_compressed_chunk_bytes)? {
            self.ship_subchunk(batch_id, chunk_index, sub, compressed).await?;
        }
        Ok(())
    }

    async fn ship_subchunk(&self, batch_id: &str, chunk_index: i64, rows: &[StoredSample], compressed: Vec<u8>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let rejection_key = rows[0].row_id;

        let mut attempt = 0;
        loop {
            match self.client.post_chunk(compressed.clone()).await {
                PostOutcome::Accepted { accepted } => {
                    self.rejection_counts.lock().unwrap().remove(&rejection_key);
                    self.on_accepted(batch_id.to_string(), chunk_index, rows, accepted).await?;
                    return Ok(());
                }
                PostOutcome::Rejected { status, body } => {
                    tracing::error!(status, body, "chunk rejected, not retrying");
                    self.sink.emit(vec![meta::uploader_rejected_total(now_ms(), &self.device_id, &self.session_id)]);

                    let count = {
                        let mut counts = self.rejection_counts.lock().unwrap();
                        let entry = counts.entry(rejection_key).or_insert(0);
                        *entry += 1;
                        *entry
                    };

                    if count >= self.config.max_consecutive_rejections {
                        tracing::warn!(
                            rows = rows.len(),
                            count,
                            "abandoning poison chunk after repeated rejections"
                        );
                        let row_ids: Vec<i64> = rows.iter().map(|r| r.row_id).collect();
                        self.store.mark_sent(row_ids).await?;
                        self.rejection_counts.lock().unwrap().remove(&rejection_key);
                    }
                    return Ok(());
                }
                PostOutcome::Retryable { retry_after, .. } => {
                    if attempt >= self.config.retry_attempts {
                        tracing::warn!(rows = rows.len(), "exhausted retries, leaving chunk unsent for next cycle");
                        self.sink.emit(vec![meta::uploader_failures_total(now_ms(), &self.device_id, &self.session_id)]);
                        return Ok(());
                    }

                    let computed = compute_backoff(attempt);
                    let delay = honor_retry_after(computed, retry_after);
                    tracing::warn!(
                        attempt,
                        computed_secs = computed.as_secs_f64(),
                        honored_secs = delay.as_secs_f64(),
                        "upload retry backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn on_accepted(&self, batch_id: String, chunk_index: i64, rows: &[StoredSample], accepted: Option<u64>) -> Result<()> {
        let accepted_count = accepted.map(|n| n as usize).unwrap_or(rows.len()).min(rows.len());
        let accepted_rows = &rows[..accepted_count];

        if !accepted_rows.is_empty() {
            let row_ids: Vec<i64> = accepted_rows.iter().map(|r| r.row_id).collect();
            self.store.mark_sent(row_ids).await?;
        }

        let max_ts = accepted_rows.last().map(|r| r.sample.timestamp_ms).unwrap_or(0);
        self.store
            .save_checkpoint(batch_id, chunk_index, accepted_count as i64, max_ts, now_ms())
            .await?;

        self.last_success_ms.store(now_ms(), Ordering::Relaxed);
        self.ever_succeeded.store(true, Ordering::Relaxed);
        self.sink.emit(vec![meta::uploader_uploaded_total(now_ms(), &self.device_id, &self.session_id, accepted_count as f64)]);

        if accepted_count < rows.len() {
            tracing::info!(accepted = accepted_count, total = rows.len(), "partial chunk acceptance");
            self.sink
                .emit(vec![meta::uploader_partial_success_total(now_ms(), &self.device_id, &self.session_id)]);
        }

        Ok(())
    }
}

/// Recursively halves a chunk until each gzip-compressed sub-chunk fits
/// under `max_bytes`, or there is nothing left to halve. A single
/// oversized row is shipped anyway rather than looping forever.
fn bisect_to_budget(rows: &[StoredSample], max_bytes: usize) -> Result<Vec<(&[StoredSample], Vec<u8>)>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let json = serialize_chunk(rows)?;
    let compressed = gzip(&json)?;

    if compressed.len() <= max_bytes || rows.len() <= 1 {
        return Ok(vec![(rows, compressed)]);
    }

    let mid = rows.len() / 2;
    let mut left = bisect_to_budget(&rows[..mid], max_bytes)?;
    let right = bisect_to_budget(&rows[mid..], max_bytes)?;
    left.extend(right);
    Ok(left)
}
