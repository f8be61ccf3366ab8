use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tidewatch_core::{Sample, Tags};
use tidewatch_platform::{CpuJiffies, PlatformReader};
use tracing::warn;

use crate::Collector;

/// `core` tag value used for the whole-machine aggregate row.
const AGGREGATE_CORE_TAG: &str = "all";

pub struct CpuCollector {
    reader: Arc<dyn PlatformReader>,
    interval: Duration,
    device_id: String,
    session_id: String,
    prev_aggregate: Option<CpuJiffies>,
    prev_per_core: HashMap<u32, CpuJiffies>,
}

impl CpuCollector {
    pub fn new(
        reader: Arc<dyn PlatformReader>,
        interval: Duration,
        device_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            interval,
            device_id: device_id.into(),
            session_id: session_id.into(),
            prev_aggregate: None,
            prev_per_core: HashMap::new(),
        }
    }

    /// Returns `None` on the first sample for this baseline, or when a
    /// counter reset (wraparound) is detected.
    fn usage_percent(core_label: &str, prev: CpuJiffies, curr: CpuJiffies) -> Option<f64> {
        let total_delta = curr.total().checked_sub(prev.total());
        let idle_delta = curr.idle_total().checked_sub(prev.idle_total());

        match (total_delta, idle_delta) {
            (Some(total), Some(idle)) if total > 0 => {
                let non_idle = total.saturating_sub(idle);
                Some((non_idle as f64 / total as f64) * 100.0)
            }
            (Some(0), Some(_)) => Some(0.0),
            _ => {
                warn!(core = core_label, "cpu counter wraparound detected, discarding sample");
                None
            }
        }
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        let snap = match self.reader.read_cpu() {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "cpu read failed");
                return Vec::new();
            }
        };

        let mut samples = Vec::new();

        if let Some(prev) = self.prev_aggregate.replace(snap.aggregate) {
            if let Some(pct) = Self::usage_percent(AGGREGATE_CORE_TAG, prev, snap.aggregate) {
                samples.push(Sample::numeric(
                    now_ms,
                    "cpu.usage_percent",
                    pct,
                    &self.device_id,
                    Tags::from_pairs([("core", AGGREGATE_CORE_TAG)]),
                    &self.session_id,
                ));
            }
        }

        for (core, curr) in &snap.per_core {
            let label = core.to_string();
            if let Some(prev) = self.prev_per_core.insert(*core, *curr) {
                if let Some(pct) = Self::usage_percent(&label, prev, *curr) {
                    samples.push(Sample::numeric(
                        now_ms,
                        "cpu.usage_percent",
                        pct,
                        &self.device_id,
                        Tags::from_pairs([("core", label.as_str())]),
                        &self.session_id,
                    ));
                }
            }
        }

        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_platform::{CpuSnapshot, FakeReader};

    fn jiffies(user: u64, idle: u64) -> CpuJiffies {
        CpuJiffies { user, idle, ..Default::default() }
    }

    #[test]
    fn first_sample_emits_nothing_but_caches_baseline() {
        let fake = Arc::new(FakeReader::new());
        fake.push_cpu(CpuSnapshot { aggregate: jiffies(100, 900), per_core: vec![] });
        let mut collector = CpuCollector::new(fake, Duration::from_secs(10), "d1", "s1");

        let samples = collector.collect(1000);
        assert!(samples.is_empty());
    }

    #[test]
    fn second_sample_emits_usage_percent() {
        let fake = Arc::new(FakeReader::new());
        fake.push_cpu(CpuSnapshot { aggregate: jiffies(100, 900), per_core: vec![] });
        fake.push_cpu(CpuSnapshot { aggregate: jiffies(150, 950), per_core: vec![] });
        let mut collector = CpuCollector::new(fake, Duration::from_secs(10), "d1", "s1");

        collector.collect(1000);
        let samples = collector.collect(2000);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "cpu.usage_percent");
        // delta: total=100, idle=50 => 50% non-idle
        match &samples[0].value {
            tidewatch_core::MetricValue::Numeric(v) => assert!((*v - 50.0).abs() < 1e-9),
            _ => panic!("expected numeric"),
        }
    }

    #[test]
    fn wraparound_is_discarded_and_rebaselines() {
        let fake = Arc::new(FakeReader::new());
        fake.push_cpu(CpuSnapshot { aggregate: jiffies(1000, 9000), per_core: vec![] });
        fake.push_cpu(CpuSnapshot { aggregate: jiffies(10, 20), per_core: vec![] });
        fake.push_cpu(CpuSnapshot { aggregate: jiffies(60, 120), per_core: vec![] });
        let mut collector = CpuCollector::new(fake, Duration::from_secs(10), "d1", "s1");

        collector.collect(1000);
        let discarded = collector.collect(2000);
        assert!(discarded.is_empty(), "wraparound tick must emit nothing");

        let recovered = collector.collect(3000);
        assert_eq!(recovered.len(), 1, "baseline should be recached after wraparound");
    }
}
