//! Orchestration for the Tidewatch metrics daemon: wires the platform
//! readers, collectors, scheduler, durable store, uploader, clock-skew
//! probe, and health endpoint from one loaded [`TidewatchConfig`].

mod error;
mod logging;
mod pipeline;
mod session;
mod sink;

pub use error::{Result, TidewatchError};
pub use pipeline::Pipeline;

use tidewatch_config::TidewatchConfig;

/// Installs logging and runs the pipeline until a shutdown signal arrives.
pub async fn run(config: TidewatchConfig) -> Result<()> {
    logging::install(&config.logging);

    let pipeline = Pipeline::start(config).await?;

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining in-flight work");

    pipeline.shutdown().await;
    tracing::info!("tidewatch stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
