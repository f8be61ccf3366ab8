use tidewatch_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber once. `RUST_LOG` overrides
/// `logging.level` when set.
pub fn install(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).try_init(),
        LogFormat::Console => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    if let Err(err) = result {
        eprintln!("tracing subscriber already installed: {err}");
    }
}
