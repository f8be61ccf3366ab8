mod backoff;
mod client;
mod compress;
mod error;
mod naming;
mod skew;
mod uploader;
mod wire;

pub use client::{PostOutcome, RemoteClient};
pub use error::{RemoteError, Result};
pub use naming::sanitize_name;
pub use skew::SkewProbe;
pub use uploader::{UploadConfig, Uploader};
