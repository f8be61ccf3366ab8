use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tidewatch_core::{Sample, Tags};
use tidewatch_platform::PlatformReader;
use tracing::warn;

use crate::Collector;

/// Disk I/O is a raw-counter passthrough — the TSDB derives rates. The only
/// state carried between ticks is each device's logical sector size, read
/// once and reused so a transient `/sys` hiccup can't change the byte math.
pub struct DiskCollector {
    reader: Arc<dyn PlatformReader>,
    interval: Duration,
    device_id: String,
    session_id: String,
    include: Vec<String>,
    sector_sizes: HashMap<String, u64>,
}

impl DiskCollector {
    pub fn new(
        reader: Arc<dyn PlatformReader>,
        interval: Duration,
        device_id: impl Into<String>,
        session_id: impl Into<String>,
        include: Vec<String>,
    ) -> Self {
        Self {
            reader,
            interval,
            device_id: device_id.into(),
            session_id: session_id.into(),
            include,
            sector_sizes: HashMap::new(),
        }
    }
}

impl Collector for DiskCollector {
    fn name(&self) -> &str {
        "disk"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        let snap = match self.reader.read_disks(&self.include) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "disk read failed");
                return Vec::new();
            }
        };

        let mut samples = Vec::new();
        for dev in &snap.devices {
            let sector_size = *self
                .sector_sizes
                .entry(dev.name.clone())
                .or_insert(dev.logical_sector_size);

            let tags = Tags::from_pairs([("device", dev.name.as_str())]);

            samples.push(Sample::numeric(
                now_ms,
                "disk.read_bytes",
                (dev.sectors_read * sector_size) as f64,
                &self.device_id,
                tags.clone(),
                &self.session_id,
            ));
            samples.push(Sample::numeric(
                now_ms,
                "disk.write_bytes",
                (dev.sectors_written * sector_size) as f64,
                &self.device_id,
                tags.clone(),
                &self.session_id,
            ));
            samples.push(Sample::numeric(
                now_ms,
                "disk.reads_completed",
                dev.reads_completed as f64,
                &self.device_id,
                tags.clone(),
                &self.session_id,
            ));
            samples.push(Sample::numeric(
                now_ms,
                "disk.writes_completed",
                dev.writes_completed as f64,
                &self.device_id,
                tags,
                &self.session_id,
            ));
        }

        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_platform::{DiskDeviceSnapshot, DiskSnapshot, FakeReader};

    #[test]
    fn converts_sectors_to_bytes_using_cached_sector_size() {
        let fake = Arc::new(FakeReader::new());
        fake.push_disks(DiskSnapshot {
            devices: vec![DiskDeviceSnapshot {
                name: "sda".to_string(),
                sectors_read: 100,
                sectors_written: 50,
                reads_completed: 10,
                writes_completed: 5,
                logical_sector_size: 512,
            }],
        });
        fake.push_disks(DiskSnapshot {
            devices: vec![DiskDeviceSnapshot {
                name: "sda".to_string(),
                sectors_read: 200,
                sectors_written: 100,
                reads_completed: 20,
                writes_completed: 10,
                logical_sector_size: 4096, // should be ignored, cached at 512
            }],
        });
        let mut collector = DiskCollector::new(fake, Duration::from_secs(10), "d1", "s1", vec![]);

        let first = collector.collect(1000);
        let read_bytes = first.iter().find(|s| s.name == "disk.read_bytes").unwrap();
        assert_eq!(read_bytes.value, tidewatch_core::MetricValue::Numeric(100.0 * 512.0));

        let second = collector.collect(2000);
        let read_bytes = second.iter().find(|s| s.name == "disk.read_bytes").unwrap();
        assert_eq!(read_bytes.value, tidewatch_core::MetricValue::Numeric(200.0 * 512.0));
    }
}
