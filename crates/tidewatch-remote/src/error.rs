use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to serialise chunk: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("gzip compression failed: {0}")]
    Compression(std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] tidewatch_store::StoreError),
    #[error("remote rejected chunk with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, RemoteError>;
