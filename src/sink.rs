use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tidewatch_core::{meta, MetricValue, MetricsSink, Sample};
use tidewatch_health::{evaluate_time, ComponentReport, HealthAggregator, Status};
use tidewatch_store::{InsertOutcome, Store};
use tokio::sync::mpsc;
use tracing::warn;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Bridges the synchronous [`MetricsSink::emit`] seam used by collectors
/// and meta-metrics to the store's async `insert_batch`. Producers never
/// await: samples go onto an unbounded channel and a single background
/// task drains it in order, so the store still sees one writer.
///
/// The same drain loop also watches for `collector.success_total` /
/// `collector.failure_total` meta-samples and folds them into the health
/// map, since those are the only signal the health aggregator has about
/// per-collector status (the `Collector` trait itself returns samples, not
/// a `Result`), and turns every `DuplicateIgnored` insert outcome into a
/// `uploader.duplicates_ignored_total` meta-sample fed back through the
/// same store.
pub struct StoreSink {
    tx: mpsc::UnboundedSender<Vec<Sample>>,
}

impl StoreSink {
    pub fn spawn(
        store: Arc<Store>,
        health: Arc<HealthAggregator>,
        skew_warn_threshold_ms: i64,
        device_id: String,
        session_id: String,
    ) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Sample>>();
        let handle = tokio::spawn(async move {
            while let Some(samples) = rx.recv().await {
                if samples.is_empty() {
                    continue;
                }
                for sample in &samples {
                    update_collector_health(&health, sample);
                    update_time_health(&health, sample, skew_warn_threshold_ms);
                }
                match store.insert_batch(samples).await {
                    Ok(outcomes) => {
                        let duplicates = outcomes.iter().filter(|o| **o == InsertOutcome::DuplicateIgnored).count();
                        if duplicates > 0 {
                            let dup_sample = meta::uploader_duplicates_ignored_total(now_ms(), &device_id, &session_id, duplicates as f64);
                            if let Err(err) = store.insert_batch(vec![dup_sample]).await {
                                warn!(error = %err, "failed to persist duplicate-count meta-sample");
                            }
                        }
                    }
                    Err(err) => warn!(error = %err, "failed to persist emitted samples"),
                }
            }
        });
        (Arc::new(Self { tx }), handle)
    }
}

fn update_collector_health(health: &HealthAggregator, sample: &Sample) {
    let Some(collector) = sample.tags.get("collector") else {
        return;
    };
    let status = match sample.name.as_str() {
        "collector.success_total" => Status::Ok,
        "collector.failure_total" => Status::Error,
        _ => return,
    };
    health.update(format!("collector.{collector}"), ComponentReport::new(status, format!("last_result={status:?}")));
}

fn update_time_health(health: &HealthAggregator, sample: &Sample, skew_warn_threshold_ms: i64) {
    if sample.name != "time.skew_ms" {
        return;
    }
    let MetricValue::Numeric(skew_ms) = sample.value else {
        return;
    };
    let status = evaluate_time(skew_ms as i64, skew_warn_threshold_ms);
    health.update("time", ComponentReport::new(status, format!("skew_ms={skew_ms}")));
}

impl MetricsSink for StoreSink {
    fn emit(&self, samples: Vec<Sample>) {
        if samples.is_empty() {
            return;
        }
        if self.tx.send(samples).is_err() {
            warn!("metrics sink channel closed, dropping samples");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_core::Tags;

    #[tokio::test]
    async fn emitted_samples_land_in_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("metrics.db")).await.unwrap());
        let health = Arc::new(HealthAggregator::new());
        let (sink, _handle) = StoreSink::spawn(store.clone(), health, 2000, "d1".to_string(), "s1".to_string());

        sink.emit(vec![Sample::numeric(1, "cpu.usage_percent", 1.0, "d1", Tags::new(), "s1")]);

        // the drain task runs on its own tokio task and the insert itself
        // hops to a blocking thread, so poll briefly instead of assuming
        // one yield is enough.
        for _ in 0..200 {
            if store.sizes().await.unwrap().pending_rows == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("sample was not persisted in time");
    }

    #[tokio::test]
    async fn collector_failure_sample_marks_component_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("metrics.db")).await.unwrap());
        let health = Arc::new(HealthAggregator::new());
        let (sink, _handle) = StoreSink::spawn(store.clone(), health.clone(), 2000, "d1".to_string(), "s1".to_string());

        sink.emit(vec![tidewatch_core::meta::collector_result(1, "d1", "s1", "cpu", false)]);

        for _ in 0..200 {
            if health.report().components.contains_key("collector.cpu") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let report = health.report();
        let cpu = report.components.get("collector.cpu").expect("collector health recorded");
        assert_eq!(cpu.status, Status::Error);
    }

    #[tokio::test]
    async fn duplicate_inserts_emit_a_duplicates_ignored_sample() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("metrics.db")).await.unwrap());
        let health = Arc::new(HealthAggregator::new());
        let (sink, _handle) = StoreSink::spawn(store.clone(), health, 2000, "d1".to_string(), "s1".to_string());

        let sample = Sample::numeric(1, "cpu.usage_percent", 1.0, "d1", Tags::new(), "s1");
        sink.emit(vec![sample.clone()]);
        sink.emit(vec![sample]);

        for _ in 0..200 {
            let unsent = store.read_unsent(100).await.unwrap();
            if unsent.iter().any(|row| row.sample.name == "uploader.duplicates_ignored_total") {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("duplicate-count meta-sample was not persisted in time");
    }
}
