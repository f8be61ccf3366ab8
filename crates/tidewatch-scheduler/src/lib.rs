//! Drives collectors on independent, drift-free cadences.
//!
//! Each collector gets its own cooperative task computing tick targets from
//! a fixed epoch (`start + k*interval`) rather than `last_finish + interval`,
//! so a slow tick doesn't push every later tick later. Ticks never queue:
//! a collector still mid-invocation when its next tick fires is skipped and
//! counted, not blocked on.

mod driver;

pub use driver::ShutdownHandle;

use std::sync::Arc;
use std::time::Duration;

use tidewatch_collect::Collector;
use tidewatch_core::MetricsSink;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long a collector's in-flight invocation is allowed to keep running
/// past a shutdown signal before the scheduler gives up waiting on it.
const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

pub struct Scheduler {
    sink: Arc<dyn MetricsSink>,
    device_id: String,
    session_id: String,
    shutdown_deadline: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(sink: Arc<dyn MetricsSink>, device_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            sink,
            device_id: device_id.into(),
            session_id: session_id.into(),
            shutdown_deadline: DEFAULT_SHUTDOWN_DEADLINE,
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn with_shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.shutdown_deadline = deadline;
        self
    }

    /// Spawns the driver task for one collector. Can be called any number
    /// of times before `shutdown` is invoked.
    pub fn spawn(&mut self, collector: Box<dyn Collector>) {
        let handle = driver::spawn_driver(
            collector,
            self.sink.clone(),
            self.device_id.clone(),
            self.session_id.clone(),
            self.shutdown_rx.clone(),
            self.shutdown_deadline,
        );
        self.handles.push(handle);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.shutdown_tx.clone())
    }

    /// Signals shutdown and waits for every driver task to return.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "collector driver task panicked");
            }
        }
    }
}
