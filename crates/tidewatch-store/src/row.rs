use rusqlite::Row;
use tidewatch_core::{MetricValue, Sample, Tags};

use crate::error::Result;

/// A stored sample plus the store-internal row id needed by `mark_sent`.
#[derive(Clone, Debug)]
pub struct StoredSample {
    pub row_id: i64,
    pub sample: Sample,
}

pub(crate) fn value_kind(value: &MetricValue) -> &'static str {
    match value {
        MetricValue::Numeric(_) => "numeric",
        MetricValue::Text(_) => "text",
    }
}

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<StoredSample> {
    let row_id: i64 = row.get("row_id")?;
    let timestamp_ms: i64 = row.get("timestamp_ms")?;
    let name: String = row.get("name")?;
    let value_kind: String = row.get("value_kind")?;
    let value_numeric: Option<f64> = row.get("value_numeric")?;
    let value_text: Option<String> = row.get("value_text")?;
    let device_id: String = row.get("device_id")?;
    let tags_json: String = row.get("tags_json")?;
    let session_id: String = row.get("session_id")?;
    let uploaded: i64 = row.get("uploaded")?;

    let value = match value_kind.as_str() {
        "text" => MetricValue::Text(value_text.unwrap_or_default()),
        _ => MetricValue::Numeric(value_numeric.unwrap_or(0.0)),
    };
    let tags: Vec<(String, String)> = serde_json::from_str(&tags_json).unwrap_or_default();

    let mut sample = Sample::new(
        timestamp_ms,
        name,
        value,
        device_id,
        Tags::from_pairs(tags),
        session_id,
    );
    sample.uploaded = uploaded != 0;

    Ok(StoredSample { row_id, sample })
}

pub(crate) fn tags_json(tags: &Tags) -> Result<String> {
    let pairs: Vec<(&str, &str)> = tags.iter().collect();
    Ok(serde_json::to_string(&pairs)?)
}

impl From<serde_json::Error> for crate::error::StoreError {
    fn from(err: serde_json::Error) -> Self {
        crate::error::StoreError::Corruption(format!("tag serialisation: {err}"))
    }
}
