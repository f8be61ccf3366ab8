use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tidewatch_core::{Sample, Tags};
use tidewatch_platform::{NetIfaceSnapshot, PlatformReader};
use tracing::warn;

use crate::Collector;

/// Matches loopback, container bridges (`docker0`, `br-*`), and virtual
/// ethernet endpoints (`veth*`) by default.
pub fn default_exclude_pattern() -> Regex {
    Regex::new(r"^(lo|docker\d*|br-.*|veth.*)$").expect("valid default exclude pattern")
}

pub fn default_include_pattern() -> Regex {
    Regex::new(".*").expect("valid default include pattern")
}

pub struct NetworkCollector {
    reader: Arc<dyn PlatformReader>,
    interval: Duration,
    device_id: String,
    session_id: String,
    include: Regex,
    exclude: Regex,
    prev: HashMap<String, NetIfaceSnapshot>,
}

impl NetworkCollector {
    pub fn new(
        reader: Arc<dyn PlatformReader>,
        interval: Duration,
        device_id: impl Into<String>,
        session_id: impl Into<String>,
        include: Regex,
        exclude: Regex,
    ) -> Self {
        Self {
            reader,
            interval,
            device_id: device_id.into(),
            session_id: session_id.into(),
            include,
            exclude,
            prev: HashMap::new(),
        }
    }

    /// Same guard as CPU: a counter lower than the last reading means the
    /// interface was reset (replaced, driver reload) rather than wrapped
    /// normally, so the tick is dropped and the baseline recached.
    fn is_reset(prev: &NetIfaceSnapshot, curr: &NetIfaceSnapshot) -> bool {
        curr.rx_bytes < prev.rx_bytes
            || curr.tx_bytes < prev.tx_bytes
            || curr.rx_packets < prev.rx_packets
            || curr.tx_packets < prev.tx_packets
    }
}

impl Collector for NetworkCollector {
    fn name(&self) -> &str {
        "network"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn collect(&mut self, now_ms: i64) -> Vec<Sample> {
        let snap = match self.reader.read_network(&self.include, &self.exclude) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "network read failed");
                return Vec::new();
            }
        };

        let mut samples = Vec::new();
        for iface in snap.interfaces {
            if let Some(prev) = self.prev.get(&iface.name) {
                if Self::is_reset(prev, &iface) {
                    warn!(interface = %iface.name, "network counter reset detected, discarding sample");
                    self.prev.insert(iface.name.clone(), iface);
                    continue;
                }
            }

            let tags = Tags::from_pairs([("interface", iface.name.as_str())]);
            samples.push(Sample::numeric(now_ms, "network.rx_bytes", iface.rx_bytes as f64, &self.device_id, tags.clone(), &self.session_id));
            samples.push(Sample::numeric(now_ms, "network.tx_bytes", iface.tx_bytes as f64, &self.device_id, tags.clone(), &self.session_id));
            samples.push(Sample::numeric(now_ms, "network.rx_packets", iface.rx_packets as f64, &self.device_id, tags.clone(), &self.session_id));
            samples.push(Sample::numeric(now_ms, "network.tx_packets", iface.tx_packets as f64, &self.device_id, tags, &self.session_id));

            self.prev.insert(iface.name.clone(), iface);
        }

        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_platform::{FakeReader, NetSnapshot};

    fn iface(name: &str, rx: u64, tx: u64) -> NetIfaceSnapshot {
        NetIfaceSnapshot { name: name.to_string(), rx_bytes: rx, tx_bytes: tx, rx_packets: rx / 100, tx_packets: tx / 100 }
    }

    #[test]
    fn emits_raw_counters_per_interface() {
        let fake = Arc::new(FakeReader::new());
        fake.push_network(NetSnapshot { interfaces: vec![iface("eth0", 1000, 2000)] });
        let mut collector = NetworkCollector::new(
            fake,
            Duration::from_secs(10),
            "d1",
            "s1",
            default_include_pattern(),
            default_exclude_pattern(),
        );

        let samples = collector.collect(1000);
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn counter_reset_is_discarded() {
        let fake = Arc::new(FakeReader::new());
        fake.push_network(NetSnapshot { interfaces: vec![iface("eth0", 5000, 5000)] });
        fake.push_network(NetSnapshot { interfaces: vec![iface("eth0", 10, 10)] });
        let mut collector = NetworkCollector::new(
            fake,
            Duration::from_secs(10),
            "d1",
            "s1",
            default_include_pattern(),
            default_exclude_pattern(),
        );

        collector.collect(1000);
        let after_reset = collector.collect(2000);
        assert!(after_reset.is_empty());
    }
}
