use serde::Serialize;
use tidewatch_core::MetricValue;
use tidewatch_store::StoredSample;

use crate::error::Result;
use crate::naming::sanitize_name;

/// The `metric` object of a wire line: `__name__` plus the full label set
/// (every tag, plus `device_id` since that's a label too).
#[derive(Serialize)]
struct Metric<'a> {
    #[serde(rename = "__name__")]
    name: String,
    #[serde(flatten)]
    labels: std::collections::HashMap<&'a str, &'a str>,
}

/// One line of the remote's line-delimited JSON import format. `values` and
/// `timestamps` are single-element arrays since each stored row is one
/// sample, not a range.
#[derive(Serialize)]
struct WireRecord<'a> {
    metric: Metric<'a>,
    values: [serde_json::Value; 1],
    timestamps: [i64; 1],
}

fn wire_value(value: &MetricValue) -> serde_json::Value {
    match value {
        MetricValue::Numeric(n) => serde_json::json!(n),
        MetricValue::Text(s) => serde_json::json!(s),
    }
}

/// Serialises rows to newline-delimited JSON, sanitising names on the way
/// out. Rows are expected to already be timestamp-sorted by the caller.
pub fn serialize_chunk(rows: &[StoredSample]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for row in rows {
        let mut labels: std::collections::HashMap<&str, &str> = row.sample.tags.iter().collect();
        labels.insert("device_id", &row.sample.device_id);

        let record = WireRecord {
            metric: Metric { name: sanitize_name(&row.sample.name), labels },
            values: [wire_value(&row.sample.value)],
            timestamps: [row.sample.timestamp_ms],
        };
        serde_json::to_writer(&mut out, &record)?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_core::{Sample, Tags};

    fn row(ts: i64, name: &str) -> StoredSample {
        StoredSample {
            row_id: 1,
            sample: Sample::numeric(ts, name, 1.0, "d1", Tags::from_pairs([("core", "all")]), "s1"),
        }
    }

    #[test]
    fn each_row_becomes_one_json_line() {
        let rows = vec![row(1, "cpu.usage_percent"), row(2, "cpu.usage_percent")];
        let bytes = serialize_chunk(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("\"__name__\":\"cpu_usage_percent\""));
        assert!(text.contains("\"device_id\":\"d1\""));
    }

    #[test]
    fn wire_shape_is_metric_values_timestamps() {
        let rows = vec![row(1_700_000_000_000, "cpu.temperature")];
        let bytes = serialize_chunk(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let line: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();

        assert_eq!(line["metric"]["__name__"], "cpu_temperature_celsius");
        assert_eq!(line["metric"]["core"], "all");
        assert_eq!(line["values"], serde_json::json!([1.0]));
        assert_eq!(line["timestamps"], serde_json::json!([1_700_000_000_000i64]));
    }
}
