use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::Regex;
use tidewatch_collect::{CpuCollector, DiskCollector, LoadCollector, MemoryCollector, NetworkCollector, ThermalCollector, UptimeCollector};
use tidewatch_config::TidewatchConfig;
use tidewatch_core::{meta, MetricsSink};
use tidewatch_health::{evaluate_storage, ComponentReport, HealthAggregator, Status, UploaderThresholds};
use tidewatch_platform::{LinuxProcReader, PlatformReader};
use tidewatch_remote::{RemoteClient, SkewProbe, UploadConfig, Uploader};
use tidewatch_scheduler::Scheduler;
use tidewatch_store::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::Result;
use crate::session::new_session_id;
use crate::sink::StoreSink;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Everything spawned while the daemon runs, owned so `run` can tear it
/// all down in one place on shutdown.
pub struct Pipeline {
    store: Arc<Store>,
    health: Arc<HealthAggregator>,
    scheduler: Scheduler,
    sink_handle: JoinHandle<()>,
    wal_handle: JoinHandle<()>,
    cleanup_handle: JoinHandle<()>,
    health_poll_handle: JoinHandle<()>,
    uploader_handle: Option<JoinHandle<()>>,
    skew_handle: Option<JoinHandle<()>>,
    health_server_handle: Option<JoinHandle<std::io::Result<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Pipeline {
    pub async fn start(config: TidewatchConfig) -> Result<Self> {
        let device_id = config.device.id.clone();
        let session_id = new_session_id();
        info!(device_id = %device_id, session_id = %session_id, "starting tidewatch");

        let store = Arc::new(Store::open(config.storage.path.clone()).await?);
        let health = Arc::new(HealthAggregator::new());
        let skew_warn_threshold_ms = config.monitoring.skew_warn_threshold.get().as_millis() as i64;
        let (sink, sink_handle) = StoreSink::spawn(store.clone(), health.clone(), skew_warn_threshold_ms, device_id.clone(), session_id.clone());
        let sink: Arc<dyn MetricsSink> = sink;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut scheduler = Scheduler::new(sink.clone(), device_id.clone(), session_id.clone());
        spawn_collectors(&mut scheduler, &config, &device_id, &session_id);

        let wal_handle = store.spawn_wal_manager();
        let cleanup_handle = spawn_cleanup(store.clone(), &config);

        let (uploader, uploader_handle, skew_handle) = if config.remote.enabled {
            let client = RemoteClient::new(
                config.remote.url.clone(),
                config
                    .monitoring
                    .skew_url
                    .clone()
                    .unwrap_or_else(|| config.remote.url.clone()),
                config.remote.auth_token.clone(),
                config.remote.timeout.get(),
            )?;

            let uploader = Arc::new(Uploader::new(
                store.clone(),
                sink.clone(),
                client.clone(),
                device_id.clone(),
                session_id.clone(),
                UploadConfig {
                    upload_interval: config.remote.upload_interval.get(),
                    batch_size: config.remote.batch_size,
                    chunk_size: config.remote.chunk_size,
                    max_compressed_chunk_bytes: config.remote.max_compressed_chunk_bytes,
                    retry_attempts: config.remote.retry_attempts,
                    max_consecutive_rejections: config.remote.max_consecutive_rejections,
                },
            ));
            let uploader_handle = uploader.clone().spawn(shutdown_rx.clone());

            let skew = Arc::new(SkewProbe::new(
                client,
                sink.clone(),
                device_id.clone(),
                session_id.clone(),
                config.monitoring.skew_probe_interval.get(),
                config.monitoring.skew_warn_threshold.get().as_millis() as i64,
            ));
            let skew_handle = skew.spawn(shutdown_rx.clone());

            (Some(uploader), Some(uploader_handle), Some(skew_handle))
        } else {
            info!("remote upload disabled, running collection-only");
            (None, None, None)
        };

        let health_poll_handle = spawn_health_poll(
            store.clone(),
            sink.clone(),
            uploader.clone(),
            health.clone(),
            config.remote.upload_interval.get(),
            device_id.clone(),
            session_id.clone(),
            shutdown_rx.clone(),
        );

        let health_server_handle = if config.health.enabled {
            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.health.port));
            let health = health.clone();
            Some(tokio::spawn(async move { tidewatch_health::serve(health, addr).await }))
        } else {
            None
        };

        Ok(Self {
            store,
            health,
            scheduler,
            sink_handle,
            wal_handle,
            cleanup_handle,
            health_poll_handle,
            uploader_handle,
            skew_handle,
            health_server_handle,
            shutdown_tx,
        })
    }

    pub fn health(&self) -> Arc<HealthAggregator> {
        self.health.clone()
    }

    /// Blocks until a shutdown signal arrives, then tears every background
    /// task down in dependency order: collectors first (so nothing new is
    /// produced), then the uploader/skew probe, then the store's
    /// maintenance tasks, finishing with a final WAL checkpoint.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        self.scheduler.shutdown().await;

        if let Some(handle) = self.uploader_handle {
            let _ = handle.await;
        }
        if let Some(handle) = self.skew_handle {
            let _ = handle.await;
        }

        self.wal_handle.abort();
        self.cleanup_handle.abort();
        self.health_poll_handle.abort();
        if let Some(handle) = self.health_server_handle {
            handle.abort();
        }

        drop(self.sink_handle);
        if let Err(err) = self.store.wal_checkpoint().await {
            tracing::warn!(error = %err, "final wal checkpoint failed during shutdown");
        }
    }
}

fn spawn_collectors(scheduler: &mut Scheduler, config: &TidewatchConfig, device_id: &str, session_id: &str) {
    let reader: Arc<dyn PlatformReader> = Arc::new(LinuxProcReader::new());

    let cpu_cfg = config.collectors.for_name("cpu");
    if cpu_cfg.enabled {
        scheduler.spawn(Box::new(CpuCollector::new(reader.clone(), cpu_cfg.interval.get(), device_id, session_id)));
    }

    let memory_cfg = config.collectors.for_name("memory");
    if memory_cfg.enabled {
        scheduler.spawn(Box::new(MemoryCollector::new(reader.clone(), memory_cfg.interval.get(), device_id, session_id)));
    }

    let disk_cfg = config.collectors.for_name("disk");
    if disk_cfg.enabled {
        scheduler.spawn(Box::new(DiskCollector::new(
            reader.clone(),
            disk_cfg.interval.get(),
            device_id,
            session_id,
            config.collectors.disk_paths.clone(),
        )));
    }

    let network_cfg = config.collectors.for_name("network");
    if network_cfg.enabled {
        let (include, exclude) = network_patterns(&config.collectors.network_interfaces);
        scheduler.spawn(Box::new(NetworkCollector::new(
            reader.clone(),
            network_cfg.interval.get(),
            device_id,
            session_id,
            include,
            exclude,
        )));
    }

    let thermal_cfg = config.collectors.for_name("thermal");
    if thermal_cfg.enabled {
        scheduler.spawn(Box::new(ThermalCollector::new(
            reader.clone(),
            thermal_cfg.interval.get(),
            device_id,
            session_id,
            config.collectors.thermal_zones.clone(),
        )));
    }

    let load_cfg = config.collectors.for_name("load");
    if load_cfg.enabled {
        scheduler.spawn(Box::new(LoadCollector::new(reader.clone(), load_cfg.interval.get(), device_id, session_id)));
    }

    let uptime_cfg = config.collectors.for_name("uptime");
    if uptime_cfg.enabled {
        scheduler.spawn(Box::new(UptimeCollector::new(reader, uptime_cfg.interval.get(), device_id, session_id)));
    }
}

/// An explicit `network_interfaces` list is treated as an include allow-list;
/// an empty list falls back to the collector's own default include/exclude
/// pair (everything except loopback/bridges/veth).
fn network_patterns(explicit: &[String]) -> (Regex, Regex) {
    if explicit.is_empty() {
        return (tidewatch_collect::default_include_pattern(), tidewatch_collect::default_exclude_pattern());
    }
    let alternation = explicit.iter().map(|s| regex::escape(s)).collect::<Vec<_>>().join("|");
    let include = Regex::new(&format!("^({alternation})$")).unwrap_or_else(|_| tidewatch_collect::default_include_pattern());
    (include, Regex::new("$^").expect("valid empty-match exclude pattern"))
}

fn spawn_cleanup(store: Arc<Store>, config: &TidewatchConfig) -> JoinHandle<()> {
    let interval = config.storage.cleanup_interval.get();
    let retention_ms = config.storage.max_age.get().as_millis() as i64;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match store.cleanup(retention_ms, now_ms()).await {
                Ok(deleted) if deleted > 0 => info!(deleted, "cleaned up aged uploaded rows"),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "retention cleanup failed"),
            }
        }
    })
}

fn spawn_health_poll(
    store: Arc<Store>,
    sink: Arc<dyn MetricsSink>,
    uploader: Option<Arc<Uploader>>,
    health: Arc<HealthAggregator>,
    upload_interval: Duration,
    device_id: String,
    session_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let thresholds = UploaderThresholds::from_interval(upload_interval.max(Duration::from_secs(1)), 100, 1000, 10_000);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }

            match store.sizes().await {
                Ok(sizes) => {
                    health.update(
                        "storage",
                        ComponentReport::new(evaluate_storage(sizes.wal_bytes), format!("wal_bytes={}", sizes.wal_bytes)),
                    );
                    sink.emit(vec![
                        meta::storage_pending_rows(now_ms(), &device_id, &session_id, sizes.pending_rows as f64),
                        meta::storage_wal_bytes(now_ms(), &device_id, &session_id, sizes.wal_bytes as f64),
                    ]);

                    if let Some(uploader) = &uploader {
                        let since_last = Duration::from_millis((now_ms() - uploader.last_success_ms()).max(0) as u64);
                        let status = thresholds.evaluate(since_last, sizes.pending_rows);
                        health.update(
                            "uploader",
                            ComponentReport::new(status, format!("pending_rows={} since_last_success_ms={}", sizes.pending_rows, since_last.as_millis())),
                        );
                        if uploader.has_succeeded() {
                            health.record_upload_success();
                        }
                    } else {
                        health.update("uploader", ComponentReport::new(Status::Ok, "uploads disabled"));
                        health.record_upload_success();
                    }
                }
                Err(err) => {
                    health.update("storage", ComponentReport::new(Status::Error, format!("sizes query failed: {err}")));
                }
            }
        }
    })
}
