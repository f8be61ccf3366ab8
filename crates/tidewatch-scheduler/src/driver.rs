use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tidewatch_collect::Collector;
use tidewatch_core::{meta, MetricsSink};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Cheap clone handed out to callers that only need to trigger shutdown,
/// without pulling in the rest of `Scheduler`.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub(crate) fn new(tx: watch::Sender<bool>) -> Self {
        Self { tx }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Skip counter for a collector's driver loop. The collector itself lives
/// in its own `Arc<Mutex<_>>` so a tick can take an *owned* guard and hand
/// it to `spawn_blocking` — a borrowed guard can't cross that boundary.
struct DriverState {
    skipped: AtomicU64,
}

pub(crate) fn spawn_driver(
    collector: Box<dyn Collector>,
    sink: Arc<dyn MetricsSink>,
    device_id: String,
    session_id: String,
    mut shutdown: watch::Receiver<bool>,
    shutdown_deadline: Duration,
) -> JoinHandle<()> {
    let name = collector.name().to_string();
    let interval = collector.interval();
    let collector = Arc::new(Mutex::new(collector));
    let state = Arc::new(DriverState {
        skipped: AtomicU64::new(0),
    });

    tokio::spawn(async move {
        let start = Instant::now();
        let mut tick: u64 = 0;

        loop {
            let target = start + interval * tick as u32;
            tokio::select! {
                _ = tokio::time::sleep_until(target) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }

            // Missed ticks coalesce onto the nearest future target instead
            // of bursting through every one that elapsed while we were
            // asleep or busy.
            let elapsed = Instant::now().saturating_duration_since(start);
            tick = (elapsed.as_nanos() / interval.as_nanos().max(1)) as u64 + 1;

            run_tick(&collector, &state, &name, &sink, &device_id, &session_id);
        }

        // Best-effort: give the last in-flight tick a chance to land before
        // this task returns, but don't block shutdown on it forever.
        if tokio::time::timeout(shutdown_deadline, collector.lock()).await.is_err() {
            tracing::error!(collector = %name, deadline_ms = shutdown_deadline.as_millis(), "in-flight tick did not finish before the shutdown deadline");
            sink.emit(vec![meta::collector_result(now_ms(), &device_id, &session_id, &name, false)]);
        }
    })
}

fn run_tick(
    collector: &Arc<Mutex<Box<dyn Collector>>>,
    state: &Arc<DriverState>,
    name: &str,
    sink: &Arc<dyn MetricsSink>,
    device_id: &str,
    session_id: &str,
) {
    let guard = match collector.clone().try_lock_owned() {
        Ok(guard) => guard,
        Err(_) => {
            let skipped = state.skipped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(collector = name, total_skipped = skipped, "previous invocation still running, skipping tick");
            sink.emit(vec![meta::collector_skipped(now_ms(), device_id, session_id, name)]);
            return;
        }
    };

    let sink = sink.clone();
    let name = name.to_string();
    let device_id = device_id.to_string();
    let session_id = session_id.to_string();

    // `Collector::collect` does synchronous file I/O; run it on the
    // blocking pool so a slow `/proc` read can't stall the async runtime.
    // The owned mutex guard travels with the closure and is dropped
    // (unlocking) when the blocking call returns, which is what lets the
    // next tick's `try_lock_owned` succeed once this invocation is done.
    tokio::task::spawn_blocking(move || {
        let mut guard = guard;
        let started = std::time::Instant::now();
        let now = now_ms();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| guard.collect(now)));
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        drop(guard);

        let samples = match result {
            Ok(samples) => samples,
            Err(_) => {
                tracing::error!(collector = %name, "collector panicked");
                sink.emit(vec![meta::collector_result(now, &device_id, &session_id, &name, false)]);
                return;
            }
        };

        let mut all = samples;
        all.push(meta::collector_duration_ms(now, &device_id, &session_id, &name, duration_ms));
        all.push(meta::collector_result(now, &device_id, &session_id, &name, true));
        sink.emit(all);
    });
}
