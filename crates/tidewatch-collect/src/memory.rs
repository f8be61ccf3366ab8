use std::sync::Arc;
use std::time::Duration;

use tidewatch_core::{Sample, Tags};
use tidewatch_platform::PlatformReader;
use tracing::warn;

use crate::Collector;

pub struct MemoryCollector {
    reader: Arc<dyn PlatformReader>,
    interval: Duration,
    device_id: String,
    session_id: String,
}

impl MemoryCollector {
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
        }
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        let snap = match self.reader.read_memory() {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "memory read failed");
                return Vec::new();
            }
        };

        let used_bytes = snap.mem_total_kb.saturating_sub(snap.mem_available_kb) * 1024;
        let available_bytes = snap.mem_available_kb * 1024;
        let swap_used_bytes = snap.swap_total_kb.saturating_sub(snap.swap_free_kb) * 1024;

        vec![
            Sample::numeric(now_ms, "memory.used_bytes", used_bytes as f64, &self.device_id, Tags::new(), &self.session_id),
            Sample::numeric(now_ms, "memory.available_bytes", available_bytes as f64, &self.device_id, Tags::new(), &self.session_id),
            Sample::numeric(now_ms, "memory.swap_used_bytes", swap_used_bytes as f64, &self.device_id, Tags::new(), &self.session_id),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_platform::{FakeReader, MemSnapshot};

    #[test]
    fn derives_used_and_swap_from_totals() {
        let fake = Arc::new(FakeReader::new());
        fake.push_memory(MemSnapshot {
            mem_total_kb: 16_000_000,
            mem_available_kb: 8_000_000,
            swap_total_kb: 2_000_000,
            swap_free_kb: 500_000,
        });
        let mut collector = MemoryCollector::new(fake, Duration::from_secs(10), "d1", "s1");

        let samples = collector.collect(1000);
        assert_eq!(samples.len(), 3);
        let used = samples.iter().find(|s| s.name == "memory.used_bytes").unwrap();
        match used.value {
            tidewatch_core::MetricValue::Numeric(v) => assert_eq!(v, 8_000_000.0 * 1024.0),
            _ => panic!("expected numeric"),
        }
    }
}
