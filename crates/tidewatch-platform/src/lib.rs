mod error;
mod fake;
#[cfg(target_os = "linux")]
mod linux;
mod reader;
mod snapshot;

pub use error::{PlatformError, Result};
pub use fake::FakeReader;
#[cfg(target_os = "linux")]
pub use linux::LinuxProcReader;
pub use reader::PlatformReader;
pub use snapshot::{
    CpuJiffies, CpuSnapshot, DiskDeviceSnapshot, DiskSnapshot, LoadSnapshot, MemSnapshot,
    NetIfaceSnapshot, NetSnapshot, ThermalSnapshot, UptimeSnapshot,
};
