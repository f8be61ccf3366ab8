use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{RemoteError, Result};

/// Speed-biased gzip, matching the uploader's preference for low CPU cost
/// over maximum ratio — these devices have a fraction of a core to spare.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).map_err(RemoteError::Compression)?;
    encoder.finish().map_err(RemoteError::Compression)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compresses_nonempty_input() {
        let data = b"hello world".repeat(100);
        let compressed = gzip(&data).unwrap();
        assert!(!compressed.is_empty());
        assert!(compressed.len() < data.len());
    }
}
