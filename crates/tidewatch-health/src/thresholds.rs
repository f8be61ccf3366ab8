use std::time::Duration;

use crate::status::Status;

/// Uploader health bands derived once at startup from the configured
/// `upload_interval`, plus pending-row watermarks.
#[derive(Clone, Copy, Debug)]
pub struct UploaderThresholds {
    pub ok_after: Duration,
    pub degraded_after: Duration,
    pub error_after: Duration,
    pub pending_ok: u64,
    pub pending_degraded: u64,
    pub pending_error: u64,
}

impl UploaderThresholds {
    pub fn from_interval(upload_interval: Duration, pending_ok: u64, pending_degraded: u64, pending_error: u64) -> Self {
        Self {
            ok_after: upload_interval * 2,
            degraded_after: upload_interval * 10,
            error_after: Duration::from_secs(600),
            pending_ok,
            pending_degraded,
            pending_error,
        }
    }

    pub fn evaluate(&self, since_last_success: Duration, pending_rows: u64) -> Status {
        if since_last_success > self.error_after && pending_rows > self.pending_error {
            return Status::Error;
        }
        if since_last_success > self.ok_after || pending_rows >= self.pending_degraded {
            return Status::Degraded;
        }
        if pending_rows < self.pending_ok {
            return Status::Ok;
        }
        Status::Degraded
    }
}

pub fn evaluate_storage(wal_bytes: u64) -> Status {
    const WAL_DEGRADED_BYTES: u64 = 64 * 1024 * 1024;
    if wal_bytes > WAL_DEGRADED_BYTES {
        Status::Degraded
    } else {
        Status::Ok
    }
}

pub fn evaluate_time(skew_ms: i64, warn_threshold_ms: i64) -> Status {
    if skew_ms.abs() > warn_threshold_ms {
        Status::Degraded
    } else {
        Status::Ok
    }
}
