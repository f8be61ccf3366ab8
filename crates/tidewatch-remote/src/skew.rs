use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tidewatch_core::{meta, MetricsSink};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::RemoteClient;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

pub struct SkewProbe {
    client: RemoteClient,
    sink: Arc<dyn MetricsSink>,
    device_id: String,
    session_id: String,
    interval: Duration,
    warn_threshold_ms: i64,
}

impl SkewProbe {
    pub fn new(
        client: RemoteClient,
        sink: Arc<dyn MetricsSink>,
        device_id: impl Into<String>,
        session_id: impl Into<String>,
        interval: Duration,
        warn_threshold_ms: i64,
    ) -> Self {
        Self {
            client,
            sink,
            device_id: device_id.into(),
            session_id: session_id.into(),
            interval,
            warn_threshold_ms,
        }
    }

    /// Probes once immediately, then on the configured interval until
    /// shutdown. This is diagnostic only — skew never touches stored
    /// sample timestamps.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.probe_once().await;

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
                self.probe_once().await;
            }
        })
    }

    async fn probe_once(&self) {
        match self.client.probe_skew().await {
            Ok(skew_ms) => {
                self.sink
                    .emit(vec![meta::time_skew_ms(now_ms(), &self.device_id, &self.session_id, skew_ms as f64)]);
                if skew_ms.abs() > self.warn_threshold_ms {
                    tracing::warn!(skew_ms, threshold_ms = self.warn_threshold_ms, "clock skew exceeds warning threshold");
                }
            }
            Err(err) => tracing::warn!(error = %err, "clock skew probe failed"),
        }
    }
}
