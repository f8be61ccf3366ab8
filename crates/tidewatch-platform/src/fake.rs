//! Deterministic `PlatformReader` for collector unit tests. Each `read_*`
//! call pops the next queued snapshot for that kind; an empty queue is a
//! test bug, not a platform error, so it panics loudly instead of returning
//! `Ok(default)`.

use std::sync::Mutex;

use regex::Regex;

use crate::error::{PlatformError, Result};
use crate::reader::PlatformReader;
use crate::snapshot::{CpuSnapshot, DiskSnapshot, LoadSnapshot, MemSnapshot, NetSnapshot, ThermalSnapshot, UptimeSnapshot};

#[derive(Default)]
pub struct FakeReader {
    cpu: Mutex<Vec<CpuSnapshot>>,
    memory: Mutex<Vec<MemSnapshot>>,
    disks: Mutex<Vec<DiskSnapshot>>,
    network: Mutex<Vec<NetSnapshot>>,
    thermal: Mutex<Vec<ThermalSnapshot>>,
    load: Mutex<Vec<LoadSnapshot>>,
    uptime: Mutex<Vec<UptimeSnapshot>>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cpu(&self, snap: CpuSnapshot) -> &Self {
        self.cpu.lock().unwrap().push(snap);
        self
    }

    pub fn push_memory(&self, snap: MemSnapshot) -> &Self {
        self.memory.lock().unwrap().push(snap);
        self
    }

    pub fn push_disks(&self, snap: DiskSnapshot) -> &Self {
        self.disks.lock().unwrap().push(snap);
        self
    }

    pub fn push_network(&self, snap: NetSnapshot) -> &Self {
        self.network.lock().unwrap().push(snap);
        self
    }

    pub fn push_thermal(&self, snap: ThermalSnapshot) -> &Self {
        self.thermal.lock().unwrap().push(snap);
        self
    }

    pub fn push_load(&self, snap: LoadSnapshot) -> &Self {
        self.load.lock().unwrap().push(snap);
        self
    }

    pub fn push_uptime(&self, snap: UptimeSnapshot) -> &Self {
        self.uptime.lock().unwrap().push(snap);
        self
    }
}

fn pop<T>(queue: &Mutex<Vec<T>>) -> Result<T> {
    let mut queue = queue.lock().unwrap();
    if queue.is_empty() {
        return Err(PlatformError::NoFixture);
    }
    Ok(queue.remove(0))
}

impl PlatformReader for FakeReader {
    fn read_cpu(&self) -> Result<CpuSnapshot> {
        pop(&self.cpu)
    }

    fn read_memory(&self) -> Result<MemSnapshot> {
        pop(&self.memory)
    }

    fn read_disks(&self, _include: &[String]) -> Result<DiskSnapshot> {
        pop(&self.disks)
    }

    fn read_network(&self, _include: &Regex, _exclude: &Regex) -> Result<NetSnapshot> {
        pop(&self.network)
    }

    fn read_thermal(&self, _zones: &[String]) -> Result<ThermalSnapshot> {
        pop(&self.thermal)
    }

    fn read_load(&self) -> Result<LoadSnapshot> {
        pop(&self.load)
    }

    fn read_uptime(&self) -> Result<UptimeSnapshot> {
        pop(&self.uptime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_queued_snapshots_in_order() {
        let fake = FakeReader::new();
        fake.push_load(LoadSnapshot { load1: 1.0, load5: 2.0, load15: 3.0 });
        fake.push_load(LoadSnapshot { load1: 9.0, load5: 9.0, load15: 9.0 });

        assert_eq!(fake.read_load().unwrap().load1, 1.0);
        assert_eq!(fake.read_load().unwrap().load1, 9.0);
    }

    #[test]
    fn empty_queue_is_no_fixture_error() {
        let fake = FakeReader::new();
        assert!(matches!(fake.read_uptime(), Err(PlatformError::NoFixture)));
    }
}
