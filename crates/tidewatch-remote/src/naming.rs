//! Wire-name sanitisation. Applied **only** on the upload path — the store
//! and collectors always see and keep the canonical dotted name.

/// Dotted names that represent monotonic counters but don't already end in
/// a totality marker. Everything else is treated as a gauge.
const COUNTER_METRICS: &[&str] = &[
    "disk.read_bytes",
    "disk.write_bytes",
    "disk.reads_completed",
    "disk.writes_completed",
    "network.rx_bytes",
    "network.tx_bytes",
    "network.rx_packets",
    "network.tx_packets",
];

/// Wire-name endings that already carry a unit. A sanitised name ending in
/// one of these is left alone rather than classified further.
const UNIT_MARKERS: &[&str] = &["_percent", "_bytes", "_celsius", "_seconds", "_ms", "_ratio", "_rows"];

/// Keywords found in a metric's last dotted segment mapped to the unit
/// suffix they imply when the name doesn't already carry one. Checked in
/// order, first match wins.
const UNIT_BY_KEYWORD: &[(&str, &str)] = &[
    ("temperature", "celsius"),
    ("temp", "celsius"),
    ("usage", "percent"),
    ("avg", "ratio"),
    ("duration", "ms"),
    ("uptime", "seconds"),
];

/// Classifies a canonical name's last segment (trailing digits stripped, so
/// `avg1`/`avg5`/`avg15` all classify as `avg`) and returns the unit suffix
/// it implies, if any.
fn unit_suffix_for(name: &str) -> Option<&'static str> {
    let last_segment = name.rsplit('.').next().unwrap_or(name);
    let keyword = last_segment.trim_end_matches(|c: char| c.is_ascii_digit());
    UNIT_BY_KEYWORD.iter().find(|(k, _)| keyword.contains(k)).map(|(_, unit)| *unit)
}

/// Maps a canonical dotted name (e.g. `disk.read_bytes`) to the sanitised
/// wire name the remote import format expects (`disk_read_bytes_total`).
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = name.replace('.', "_");

    if COUNTER_METRICS.contains(&name) && !sanitized.ends_with("_total") {
        sanitized.push_str("_total");
    }

    if !UNIT_MARKERS.iter().any(|marker| sanitized.ends_with(marker)) {
        if let Some(unit) = unit_suffix_for(name) {
            sanitized.push('_');
            sanitized.push_str(unit);
        }
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dots_become_underscores() {
        assert_eq!(sanitize_name("cpu.usage_percent"), "cpu_usage_percent");
    }

    #[test]
    fn counters_gain_totality_marker() {
        assert_eq!(sanitize_name("disk.read_bytes"), "disk_read_bytes_total");
        assert_eq!(sanitize_name("network.rx_packets"), "network_rx_packets_total");
    }

    #[test]
    fn already_total_suffixed_names_are_untouched() {
        assert_eq!(sanitize_name("uploader.metrics_uploaded_total"), "uploader_metrics_uploaded_total");
    }

    #[test]
    fn unitless_gauges_gain_unit_suffix() {
        assert_eq!(sanitize_name("load.avg1"), "load_avg1_ratio");
        assert_eq!(sanitize_name("load.avg5"), "load_avg5_ratio");
        assert_eq!(sanitize_name("load.avg15"), "load_avg15_ratio");
    }

    #[test]
    fn unit_suffix_generalizes_beyond_the_hardcoded_names() {
        assert_eq!(sanitize_name("cpu.temperature"), "cpu_temperature_celsius");
    }

    #[test]
    fn names_that_already_carry_a_unit_are_untouched() {
        assert_eq!(sanitize_name("thermal.zone_celsius"), "thermal_zone_celsius");
        assert_eq!(sanitize_name("memory.used_bytes"), "memory_used_bytes");
        assert_eq!(sanitize_name("time.skew_ms"), "time_skew_ms");
    }
}
