use thiserror::Error;

/// Error taxonomy for the store, split along the line that matters to
/// callers: transient errors are already retried internally and should
/// essentially never surface; everything else is a logical or I/O failure
/// the caller must treat as fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite busy after internal retries: {0}")]
    Busy(rusqlite::Error),

    #[error("database corruption or unreadable schema: {0}")]
    Corruption(String),

    #[error("schema version {found} is newer than the {supported} this binary supports")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
