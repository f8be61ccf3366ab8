use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// A fresh opaque id for this process's lifetime. Not part of sample
/// identity (see `Sample::dedup_key`) — purely a debugging aid for
/// correlating rows with the run that produced them.
pub fn new_session_id() -> String {
    let pid = std::process::id();
    let started_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    let nonce: u32 = rand::thread_rng().gen();
    format!("{pid:x}-{started_ms:x}-{nonce:08x}")
}
