use thiserror::Error;

/// Top-level failure a fatal startup problem is reported as. Only used by
/// `main` to pick a distinct non-zero exit status; the crates underneath
/// keep their own error types at their own seams.
#[derive(Debug, Error)]
pub enum TidewatchError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] tidewatch_config::ConfigError),
    #[error("failed to open durable store: {0}")]
    Store(#[from] tidewatch_store::StoreError),
    #[error("failed to build remote client: {0}")]
    Remote(#[from] tidewatch_remote::RemoteError),
    #[error("health endpoint failed: {0}")]
    Health(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TidewatchError>;
