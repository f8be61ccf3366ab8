mod cpu;
mod disk;
mod gauges;
mod memory;
mod network;

pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use gauges::{LoadCollector, ThermalCollector, UptimeCollector};
pub use memory::MemoryCollector;
pub use network::{default_exclude_pattern, default_include_pattern, NetworkCollector};

use tidewatch_core::Sample;

/// Uniform shape the scheduler drives every collector through. Interval is
/// fixed at construction — the scheduler reads it once to plan tick targets,
/// it is not re-queried per tick.
pub trait Collector: Send {
    fn name(&self) -> &str;
    fn interval(&self) -> std::time::Duration;
    fn collect(&mut self, now_ms: i64) -> Vec<Sample>;
}
