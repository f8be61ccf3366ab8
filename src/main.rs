use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tidewatch_config::TidewatchConfig;

/// System-metrics collection daemon: scheduled collectors, a durable queue,
/// a chunked/compressed/retrying uploader, and a graduated health report.
#[derive(Parser, Debug)]
#[command(name = "tidewatch", version, about)]
struct Cli {
    /// Path to the TOML configuration file. Missing file or parse failure
    /// is a fatal startup error.
    #[arg(short, long, env = "TIDEWATCH_CONFIG", default_value = "tidewatch.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match TidewatchConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            return ExitCode::from(78); // EX_CONFIG
        }
    };

    match tidewatch::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tidewatch exited with a fatal error: {err}");
            ExitCode::from(70) // EX_SOFTWARE
        }
    }
}
