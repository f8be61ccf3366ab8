use regex::Regex;

use crate::error::Result;
use crate::snapshot::{CpuSnapshot, DiskSnapshot, LoadSnapshot, MemSnapshot, NetSnapshot, ThermalSnapshot, UptimeSnapshot};

/// Seam between the collectors (C4) and the host. Every method is a
/// synchronous, stateless read of whatever the platform currently reports
/// — any "previous sample" state lives in the collector, not here.
pub trait PlatformReader: Send + Sync {
    fn read_cpu(&self) -> Result<CpuSnapshot>;
    fn read_memory(&self) -> Result<MemSnapshot>;
    /// `include` is matched against device names (whole-device only,
    /// partitions already excluded by the implementation).
    fn read_disks(&self, include: &[String]) -> Result<DiskSnapshot>;
    fn read_network(&self, include: &Regex, exclude: &Regex) -> Result<NetSnapshot>;
    fn read_thermal(&self, zones: &[String]) -> Result<ThermalSnapshot>;
    fn read_load(&self) -> Result<LoadSnapshot>;
    fn read_uptime(&self) -> Result<UptimeSnapshot>;
}
