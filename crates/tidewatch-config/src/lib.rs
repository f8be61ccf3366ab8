//! Configuration model and loader for the Tidewatch daemon.
//!
//! The wire format (TOML) was left unspecified by the source spec — the
//! config file itself is an external collaborator. TOML + serde is the
//! idiom this workspace otherwise follows, so that is what this crate
//! implements; see `DESIGN.md` for the record of that choice.

mod duration;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use duration::HumanDuration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TidewatchConfig {
    pub device: DeviceConfig,
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub collectors: CollectorsConfig,
    pub monitoring: MonitoringConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
}

impl Default for TidewatchConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            remote: RemoteConfig::default(),
            storage: StorageConfig::default(),
            collectors: CollectorsConfig::default(),
            monitoring: MonitoringConfig::default(),
            health: HealthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TidewatchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    pub fn parse(raw: &str, path: impl AsRef<Path>) -> Result<Self> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.as_ref().display().to_string(),
            source,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: "unknown-device".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub enabled: bool,
    pub upload_interval: HumanDuration,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub timeout: HumanDuration,
    pub retry_attempts: u32,
    pub retry_delay: HumanDuration,
    pub max_compressed_chunk_bytes: usize,
    pub max_consecutive_rejections: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: None,
            enabled: false,
            upload_interval: HumanDuration::from_secs(30),
            batch_size: 1000,
            chunk_size: 50,
            timeout: HumanDuration::from_secs(30),
            retry_attempts: 3,
            retry_delay: HumanDuration::from_secs(5),
            max_compressed_chunk_bytes: 256 * 1024,
            max_consecutive_rejections: 3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    pub max_age: HumanDuration,
    pub cleanup_interval: HumanDuration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "tidewatch-data/metrics.db".to_string(),
            max_age: HumanDuration::from_secs(168 * 3600),
            cleanup_interval: HumanDuration::from_secs(3600),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub enabled: bool,
    pub interval: HumanDuration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: HumanDuration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    pub entries: HashMap<String, CollectorConfig>,
    pub disk_paths: Vec<String>,
    pub network_interfaces: Vec<String>,
    pub thermal_zones: Vec<String>,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            disk_paths: Vec::new(),
            network_interfaces: Vec::new(),
            thermal_zones: Vec::new(),
        }
    }
}

impl CollectorsConfig {
    pub fn for_name(&self, name: &str) -> CollectorConfig {
        self.entries.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub skew_url: Option<String>,
    pub skew_warn_threshold: HumanDuration,
    pub skew_probe_interval: HumanDuration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            skew_url: None,
            skew_warn_threshold: HumanDuration(std::time::Duration::from_millis(2000)),
            skew_probe_interval: HumanDuration::from_secs(5 * 60),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Console,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = TidewatchConfig::parse("", "test.toml").unwrap();
        assert_eq!(cfg.remote.batch_size, 1000);
        assert_eq!(cfg.storage.cleanup_interval.get().as_secs(), 3600);
    }

    #[test]
    fn parses_minimal_remote_section() {
        let raw = r#"
            [device]
            id = "edge-01"

            [remote]
            url = "https://ingest.example.com/write"
            enabled = true
            upload_interval = "15s"
        "#;
        let cfg = TidewatchConfig::parse(raw, "test.toml").unwrap();
        assert_eq!(cfg.device.id, "edge-01");
        assert!(cfg.remote.enabled);
        assert_eq!(cfg.remote.upload_interval.get().as_secs(), 15);
        assert_eq!(cfg.remote.chunk_size, 50, "unset fields keep defaults");
    }

    #[test]
    fn per_collector_overrides_are_keyed_by_name() {
        let raw = r#"
            [collectors.entries.cpu]
            enabled = true
            interval = "5s"

            [collectors.entries.disk]
            enabled = false
            interval = "60s"
        "#;
        let cfg = TidewatchConfig::parse(raw, "test.toml").unwrap();
        assert_eq!(cfg.collectors.for_name("cpu").interval.get().as_secs(), 5);
        assert!(!cfg.collectors.for_name("disk").enabled);
        assert!(cfg.collectors.for_name("missing").enabled, "unknown collector falls back to default");
    }

    #[test]
    fn rejects_malformed_duration() {
        let raw = r#"
            [remote]
            upload_interval = "not-a-duration"
        "#;
        assert!(TidewatchConfig::parse(raw, "test.toml").is_err());
    }
}
