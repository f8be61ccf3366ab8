//! Self-observation sample constructors.
//!
//! Meta-metrics ride the same [`crate::MetricsSink`] and the same store as
//! ordinary collector output, so they get the same durability and delivery
//! guarantees. Cardinality is bounded by construction: none of these take a
//! per-request label, only a fixed set: `collector.*`, `uploader.*`,
//! `storage.*`, `time.skew_ms`, `*_duration_*`.

use crate::sample::Sample;
use crate::tags::Tags;

/// Builds a meta-metric sample. `device_id`/`session_id` are threaded
/// through so meta-metrics are indistinguishable from ordinary samples on
/// the wire.
fn build(
    now_ms: i64,
    name: &str,
    value: f64,
    device_id: &str,
    session_id: &str,
    extra_tags: Tags,
) -> Sample {
    Sample::numeric(now_ms, name, value, device_id, extra_tags, session_id)
}

pub fn collector_duration_ms(
    now_ms: i64,
    device_id: &str,
    session_id: &str,
    collector: &str,
    duration_ms: f64,
) -> Sample {
    let tags = Tags::from_pairs([("collector", collector)]);
    build(
        now_ms,
        "collector.duration_ms",
        duration_ms,
        device_id,
        session_id,
        tags,
    )
}

pub fn collector_result(
    now_ms: i64,
    device_id: &str,
    session_id: &str,
    collector: &str,
    success: bool,
) -> Sample {
    let tags = Tags::from_pairs([("collector", collector)]);
    let name = if success {
        "collector.success_total"
    } else {
        "collector.failure_total"
    };
    build(now_ms, name, 1.0, device_id, session_id, tags)
}

pub fn collector_skipped(now_ms: i64, device_id: &str, session_id: &str, collector: &str) -> Sample {
    let tags = Tags::from_pairs([("collector", collector)]);
    build(
        now_ms,
        "collector.skipped_total",
        1.0,
        device_id,
        session_id,
        tags,
    )
}

pub fn uploader_uploaded_total(now_ms: i64, device_id: &str, session_id: &str, count: f64) -> Sample {
    build(
        now_ms,
        "uploader.metrics_uploaded_total",
        count,
        device_id,
        session_id,
        Tags::new(),
    )
}

pub fn uploader_failures_total(now_ms: i64, device_id: &str, session_id: &str) -> Sample {
    build(
        now_ms,
        "uploader.upload_failures_total",
        1.0,
        device_id,
        session_id,
        Tags::new(),
    )
}

pub fn uploader_partial_success_total(now_ms: i64, device_id: &str, session_id: &str) -> Sample {
    build(
        now_ms,
        "uploader.partial_success_total",
        1.0,
        device_id,
        session_id,
        Tags::new(),
    )
}

pub fn uploader_rejected_total(now_ms: i64, device_id: &str, session_id: &str) -> Sample {
    build(
        now_ms,
        "uploader.rejected_total",
        1.0,
        device_id,
        session_id,
        Tags::new(),
    )
}

pub fn uploader_duplicates_ignored_total(now_ms: i64, device_id: &str, session_id: &str, count: f64) -> Sample {
    build(
        now_ms,
        "uploader.duplicates_ignored_total",
        count,
        device_id,
        session_id,
        Tags::new(),
    )
}

pub fn storage_pending_rows(now_ms: i64, device_id: &str, session_id: &str, rows: f64) -> Sample {
    build(
        now_ms,
        "storage.pending_rows",
        rows,
        device_id,
        session_id,
        Tags::new(),
    )
}

pub fn storage_wal_bytes(now_ms: i64, device_id: &str, session_id: &str, bytes: f64) -> Sample {
    build(
        now_ms,
        "storage.wal_bytes",
        bytes,
        device_id,
        session_id,
        Tags::new(),
    )
}

pub fn time_skew_ms(now_ms: i64, device_id: &str, session_id: &str, skew_ms: f64) -> Sample {
    build(now_ms, "time.skew_ms", skew_ms, device_id, session_id, Tags::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_samples_carry_device_and_session() {
        let s = collector_duration_ms(1, "dev", "sess", "cpu", 12.5);
        assert_eq!(s.device_id, "dev");
        assert_eq!(s.session_id, "sess");
        assert_eq!(s.tags.get("collector"), Some("cpu"));
    }
}
