/// Raw per-core (or aggregate) jiffy counters from `/proc/stat`. All
/// fields are monotonically increasing for the lifetime of the host.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CpuJiffies {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuJiffies {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CpuSnapshot {
    pub aggregate: CpuJiffies,
    /// `(core_index, jiffies)`, in `/proc/stat` order.
    pub per_core: Vec<(u32, CpuJiffies)>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MemSnapshot {
    pub mem_total_kb: u64,
    pub mem_available_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiskDeviceSnapshot {
    pub name: String,
    pub sectors_read: u64,
    pub sectors_written: u64,
    pub reads_completed: u64,
    pub writes_completed: u64,
    pub logical_sector_size: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiskSnapshot {
    pub devices: Vec<DiskDeviceSnapshot>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetIfaceSnapshot {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetSnapshot {
    pub interfaces: Vec<NetIfaceSnapshot>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThermalSnapshot {
    /// `(zone_name, celsius)`.
    pub zones: Vec<(String, f64)>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoadSnapshot {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UptimeSnapshot {
    pub uptime_seconds: f64,
}
