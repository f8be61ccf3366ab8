use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },
    #[error("platform reader not supported on this target")]
    Unsupported,
    #[error("no preset snapshot queued for this call")]
    NoFixture,
}

pub type Result<T> = std::result::Result<T, PlatformError>;
