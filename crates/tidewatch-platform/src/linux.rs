//! Reads `/proc` and `/sys` on Linux hosts. Every parse failure is surfaced
//! as `PlatformError::Parse` rather than panicking — a malformed line in
//! `/proc/diskstats` should drop that one collector tick, not the daemon.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{PlatformError, Result};
use crate::reader::PlatformReader;
use crate::snapshot::{
    CpuJiffies, CpuSnapshot, DiskDeviceSnapshot, DiskSnapshot, LoadSnapshot, MemSnapshot,
    NetIfaceSnapshot, NetSnapshot, ThermalSnapshot, UptimeSnapshot,
};

fn read_to_string(path: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|source| PlatformError::Io {
        path: path.to_string(),
        source,
    })
}

fn parse_u64(what: &str, field: &str) -> Result<u64> {
    field.parse().map_err(|_| PlatformError::Parse {
        what: what.to_string(),
        detail: format!("{field:?} is not a u64"),
    })
}

fn parse_f64(what: &str, field: &str) -> Result<f64> {
    field.parse().map_err(|_| PlatformError::Parse {
        what: what.to_string(),
        detail: format!("{field:?} is not a f64"),
    })
}

fn cpu_jiffies_from_fields(what: &str, fields: &[&str]) -> Result<CpuJiffies> {
    let get = |i: usize| -> Result<u64> {
        fields.get(i).map_or(Ok(0), |f| parse_u64(what, f))
    };
    Ok(CpuJiffies {
        user: get(0)?,
        nice: get(1)?,
        system: get(2)?,
        idle: get(3)?,
        iowait: get(4)?,
        irq: get(5)?,
        softirq: get(6)?,
        steal: get(7)?,
    })
}

pub struct LinuxProcReader {
    proc_root: String,
    sys_root: String,
}

impl Default for LinuxProcReader {
    fn default() -> Self {
        Self {
            proc_root: "/proc".to_string(),
            sys_root: "/sys".to_string(),
        }
    }
}

impl LinuxProcReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Used by integration tests to point at a fixture tree instead of the
    /// real `/proc` and `/sys`.
    pub fn with_roots(proc_root: impl Into<String>, sys_root: impl Into<String>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    fn sector_size(&self, device: &str) -> u64 {
        let path = format!("{}/block/{device}/queue/logical_block_size", self.sys_root);
        fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(512)
    }

    fn is_whole_device(name: &str) -> bool {
        // Partitions end in a digit for most disk types (sda1, nvme0n1p1)
        // except the loop/dm-* families, which this daemon doesn't collect.
        !name.chars().last().map_or(false, |c| c.is_ascii_digit())
            || name.starts_with("nvme") && !name.contains('p')
    }
}

impl PlatformReader for LinuxProcReader {
    fn read_cpu(&self) -> Result<CpuSnapshot> {
        let text = read_to_string(&format!("{}/stat", self.proc_root))?;
        let mut aggregate = CpuJiffies::default();
        let mut per_core = Vec::new();

        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let label = match fields.next() {
                Some(l) => l,
                None => continue,
            };
            if label == "cpu" {
                let rest: Vec<&str> = fields.collect();
                aggregate = cpu_jiffies_from_fields("/proc/stat aggregate", &rest)?;
            } else if let Some(idx) = label.strip_prefix("cpu") {
                if let Ok(core) = idx.parse::<u32>() {
                    let rest: Vec<&str> = fields.collect();
                    per_core.push((core, cpu_jiffies_from_fields("/proc/stat per-core", &rest)?));
                }
            }
        }

        Ok(CpuSnapshot { aggregate, per_core })
    }

    fn read_memory(&self) -> Result<MemSnapshot> {
        let text = read_to_string(&format!("{}/meminfo", self.proc_root))?;
        let mut snap = MemSnapshot::default();

        for line in text.lines() {
            let mut parts = line.splitn(2, ':');
            let key = parts.next().unwrap_or_default();
            let value_field = parts
                .next()
                .and_then(|v| v.trim().split_whitespace().next())
                .unwrap_or("0");
            let value = parse_u64("/proc/meminfo", value_field)?;
            match key {
                "MemTotal" => snap.mem_total_kb = value,
                "MemAvailable" => snap.mem_available_kb = value,
                "SwapTotal" => snap.swap_total_kb = value,
                "SwapFree" => snap.swap_free_kb = value,
                _ => {}
            }
        }

        Ok(snap)
    }

    fn read_disks(&self, include: &[String]) -> Result<DiskSnapshot> {
        let text = read_to_string(&format!("{}/diskstats", self.proc_root))?;
        let mut devices = Vec::new();

        for line in text.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 14 {
                continue;
            }
            let name = fields[2].to_string();
            if !Self::is_whole_device(&name) {
                continue;
            }
            if !include.is_empty() && !include.iter().any(|d| d == &name) {
                continue;
            }

            devices.push(DiskDeviceSnapshot {
                reads_completed: parse_u64("/proc/diskstats", fields[3])?,
                sectors_read: parse_u64("/proc/diskstats", fields[5])?,
                writes_completed: parse_u64("/proc/diskstats", fields[7])?,
                sectors_written: parse_u64("/proc/diskstats", fields[9])?,
                logical_sector_size: self.sector_size(&name),
                name,
            });
        }

        Ok(DiskSnapshot { devices })
    }

    fn read_network(&self, include: &Regex, exclude: &Regex) -> Result<NetSnapshot> {
        let text = read_to_string(&format!("{}/net/dev", self.proc_root))?;
        let mut interfaces = Vec::new();

        for line in text.lines().skip(2) {
            let mut parts = line.splitn(2, ':');
            let name = match parts.next() {
                Some(n) => n.trim().to_string(),
                None => continue,
            };
            let rest = match parts.next() {
                Some(r) => r,
                None => continue,
            };

            if !include.is_match(&name) || exclude.is_match(&name) {
                continue;
            }

            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() < 16 {
                continue;
            }

            interfaces.push(NetIfaceSnapshot {
                rx_bytes: parse_u64("/proc/net/dev", fields[0])?,
                rx_packets: parse_u64("/proc/net/dev", fields[1])?,
                tx_bytes: parse_u64("/proc/net/dev", fields[8])?,
                tx_packets: parse_u64("/proc/net/dev", fields[9])?,
                name,
            });
        }

        Ok(NetSnapshot { interfaces })
    }

    fn read_thermal(&self, zones: &[String]) -> Result<ThermalSnapshot> {
        let mut out = Vec::new();
        let base = Path::new(&self.sys_root).join("class/thermal");
        let entries = match fs::read_dir(&base) {
            Ok(e) => e,
            Err(_) => return Ok(ThermalSnapshot::default()),
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("thermal_zone") {
                continue;
            }
            if !zones.is_empty() && !zones.iter().any(|z| z == &name) {
                continue;
            }
            let temp_path = entry.path().join("temp");
            let raw = match fs::read_to_string(&temp_path) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            let millidegrees = parse_f64("thermal zone temp", raw.trim())?;
            out.push((name, millidegrees / 1000.0));
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ThermalSnapshot { zones: out })
    }

    fn read_load(&self) -> Result<LoadSnapshot> {
        let text = read_to_string(&format!("{}/loadavg", self.proc_root))?;
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(PlatformError::Parse {
                what: "/proc/loadavg".to_string(),
                detail: "fewer than 3 fields".to_string(),
            });
        }
        Ok(LoadSnapshot {
            load1: parse_f64("/proc/loadavg", fields[0])?,
            load5: parse_f64("/proc/loadavg", fields[1])?,
            load15: parse_f64("/proc/loadavg", fields[2])?,
        })
    }

    fn read_uptime(&self) -> Result<UptimeSnapshot> {
        let text = read_to_string(&format!("{}/uptime", self.proc_root))?;
        let field = text
            .split_whitespace()
            .next()
            .ok_or_else(|| PlatformError::Parse {
                what: "/proc/uptime".to_string(),
                detail: "empty file".to_string(),
            })?;
        Ok(UptimeSnapshot {
            uptime_seconds: parse_f64("/proc/uptime", field)?,
        })
    }
}
