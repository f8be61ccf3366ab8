use std::sync::Arc;
use std::time::Duration;

use tidewatch_core::{Sample, Tags};
use tidewatch_platform::PlatformReader;
use tracing::warn;

use crate::Collector;

pub struct ThermalCollector {
    reader: Arc<dyn PlatformReader>,
    interval: Duration,
    device_id: String,
    session_id: String,
    zones: Vec<String>,
}

impl ThermalCollector {
    pub fn new(
        reader: Arc<dyn PlatformReader>,
        interval: Duration,
        device_id: impl Into<String>,
        session_id: impl Into<String>,
        zones: Vec<String>,
    ) -> Self {
        Self { reader, interval, device_id: device_id.into(), session_id: session_id.into(), zones }
    }
}

impl Collector for ThermalCollector {
    fn name(&self) -> &str {
        "thermal"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        let snap = match self.reader.read_thermal(&self.zones) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "thermal read failed");
                return Vec::new();
            }
        };

        snap.zones
            .into_iter()
            .map(|(zone, celsius)| {
                Sample::numeric(now_ms, "thermal.zone_celsius", celsius, &self.device_id, Tags::from_pairs([("zone", zone.as_str())]), &self.session_id)
            })
            .collect()
    }
}

pub struct LoadCollector {
    reader: Arc<dyn PlatformReader>,
    interval: Duration,
    device_id: String,
    session_id: String,
}

impl LoadCollector {
    pub fn new(reader: Arc<dyn PlatformReader>, interval: Duration, device_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self { reader, interval, device_id: device_id.into(), session_id: session_id.into() }
    }
}

impl Collector for LoadCollector {
    fn name(&self) -> &str {
        "load"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        let snap = match self.reader.read_load() {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "load read failed");
                return Vec::new();
            }
        };

        vec![
            Sample::numeric(now_ms, "load.avg1", snap.load1, &self.device_id, Tags::new(), &self.session_id),
            Sample::numeric(now_ms, "load.avg5", snap.load5, &self.device_id, Tags::new(), &self.session_id),
            Sample::numeric(now_ms, "load.avg15", snap.load15, &self.device_id, Tags::new(), &self.session_id),
        ]
    }
}

pub struct UptimeCollector {
    reader: Arc<dyn PlatformReader>,
    interval: Duration,
    device_id: String,
    session_id: String,
}

impl UptimeCollector {
    pub fn new(reader: Arc<dyn PlatformReader>, interval: Duration, device_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self { reader, interval, device_id: device_id.into(), session_id: session_id.into() }
    }
}

impl Collector for UptimeCollector {
    fn name(&self) -> &str {
        "uptime"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        let snap = match self.reader.read_uptime() {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "uptime read failed");
                return Vec::new();
            }
        };

        vec![Sample::numeric(now_ms, "uptime.seconds", snap.uptime_seconds, &self.device_id, Tags::new(), &self.session_id)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_platform::{FakeReader, LoadSnapshot, ThermalSnapshot, UptimeSnapshot};

    #[test]
    fn thermal_emits_one_sample_per_zone() {
        let fake = Arc::new(FakeReader::new());
        fake.push_thermal(ThermalSnapshot { zones: vec![("thermal_zone0".to_string(), 45.5), ("thermal_zone1".to_string(), 50.0)] });
        let mut collector = ThermalCollector::new(fake, Duration::from_secs(30), "d1", "s1", vec![]);

        let samples = collector.collect(1000);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn load_emits_three_averages() {
        let fake = Arc::new(FakeReader::new());
        fake.push_load(LoadSnapshot { load1: 0.1, load5: 0.2, load15: 0.3 });
        let mut collector = LoadCollector::new(fake, Duration::from_secs(30), "d1", "s1");

        assert_eq!(collector.collect(1000).len(), 3);
    }

    #[test]
    fn uptime_emits_single_gauge() {
        let fake = Arc::new(FakeReader::new());
        fake.push_uptime(UptimeSnapshot { uptime_seconds: 12345.0 });
        let mut collector = UptimeCollector::new(fake, Duration::from_secs(30), "d1", "s1");

        assert_eq!(collector.collect(1000).len(), 1);
    }
}
