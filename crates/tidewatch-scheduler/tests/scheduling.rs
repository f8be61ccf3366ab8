use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tidewatch_collect::Collector;
use tidewatch_core::{MetricsSink, Sample};
use tidewatch_scheduler::Scheduler;

struct CountingCollector {
    interval: Duration,
    calls: Arc<AtomicUsize>,
    /// When set, the *first* call blocks on `release` until the test sends
    /// a token, simulating a slow in-flight invocation without a real
    /// wall-clock sleep.
    hold_first_call: Arc<AtomicBool>,
    release: Arc<Mutex<Receiver<()>>>,
}

impl Collector for CountingCollector {
    fn name(&self) -> &str {
        "counting"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_first_call.swap(false, Ordering::SeqCst) {
            let _ = self.release.lock().unwrap().recv();
        }
        vec![Sample::numeric(now_ms, "counting.calls", 1.0, "d1", Default::default(), "s1")]
    }
}

#[derive(Default)]
struct CollectingSink {
    samples: Mutex<Vec<Sample>>,
}

impl MetricsSink for CollectingSink {
    fn emit(&self, mut samples: Vec<Sample>) {
        self.samples.lock().unwrap().append(&mut samples);
    }
}

#[tokio::test(start_paused = true)]
async fn fires_on_schedule_without_drift() {
    let sink: Arc<CollectingSink> = Arc::new(CollectingSink::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let (_tx, rx): (Sender<()>, Receiver<()>) = mpsc::channel();
    let mut scheduler = Scheduler::new(sink.clone() as Arc<dyn MetricsSink>, "d1", "s1");
    scheduler.spawn(Box::new(CountingCollector {
        interval: Duration::from_secs(1),
        calls: calls.clone(),
        hold_first_call: Arc::new(AtomicBool::new(false)),
        release: Arc::new(Mutex::new(rx)),
    }));

    tokio::time::advance(Duration::from_millis(3_500)).await;
    tokio::task::yield_now().await;

    assert!(calls.load(Ordering::SeqCst) >= 3, "expected at least 3 ticks by 3.5 intervals");

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn overlapping_tick_is_skipped_not_queued() {
    let sink: Arc<CollectingSink> = Arc::new(CollectingSink::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let (tx, rx): (Sender<()>, Receiver<()>) = mpsc::channel();
    let mut scheduler = Scheduler::new(sink.clone() as Arc<dyn MetricsSink>, "d1", "s1");
    scheduler.spawn(Box::new(CountingCollector {
        interval: Duration::from_millis(100),
        calls: calls.clone(),
        hold_first_call: Arc::new(AtomicBool::new(true)),
        release: Arc::new(Mutex::new(rx)),
    }));

    tokio::time::advance(Duration::from_millis(450)).await;
    tokio::task::yield_now().await;

    // the first invocation is still blocked holding the collector's mutex,
    // so later ticks must be skipped rather than queued behind it.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let skipped = sink
        .samples
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.name == "collector.skipped_total")
        .count();
    assert!(skipped >= 1, "expected at least one skipped-tick meta sample");

    let _ = tx.send(());
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_deadline_elapsing_is_recorded_and_does_not_block() {
    let sink: Arc<CollectingSink> = Arc::new(CollectingSink::default());
    let calls = Arc::new(AtomicUsize::new(0));

    // Sender kept alive but never sent to, so the in-flight tick's
    // `collect()` call blocks on `recv()` for the rest of the test.
    let (_tx, rx): (Sender<()>, Receiver<()>) = mpsc::channel();
    let mut scheduler = Scheduler::new(sink.clone() as Arc<dyn MetricsSink>, "d1", "s1")
        .with_shutdown_deadline(Duration::from_millis(50));
    scheduler.spawn(Box::new(CountingCollector {
        interval: Duration::from_millis(100),
        calls: calls.clone(),
        hold_first_call: Arc::new(AtomicBool::new(true)),
        release: Arc::new(Mutex::new(rx)),
    }));

    tokio::time::advance(Duration::from_millis(150)).await;
    tokio::task::yield_now().await;

    // The held tick never returns, so `shutdown` must give up once the
    // deadline elapses rather than waiting on it forever.
    scheduler.shutdown().await;

    let failures = sink.samples.lock().unwrap().iter().filter(|s| s.name == "collector.failure_total").count();
    assert!(failures >= 1, "expected the shutdown-deadline miss to be recorded as a failure");
}
