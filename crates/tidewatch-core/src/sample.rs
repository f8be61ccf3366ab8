use serde::{Deserialize, Serialize};

use crate::dedup::dedup_key;
use crate::tags::Tags;

/// Exactly one of the two variants is meaningful for a given sample; the
/// discriminant is the enum tag itself rather than a separate flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Numeric(f64),
    Text(String),
}

/// The atomic unit of the collection pipeline.
///
/// `dedup_key` is derived, not chosen: constructing a `Sample` always
/// recomputes it from the other fields, so there is no way to observe a
/// sample whose key disagrees with its contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub name: String,
    pub value: MetricValue,
    pub device_id: String,
    pub tags: Tags,
    pub session_id: String,
    pub uploaded: bool,
    pub dedup_key: [u8; 32],
}

impl Sample {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp_ms: i64,
        name: impl Into<String>,
        value: MetricValue,
        device_id: impl Into<String>,
        tags: Tags,
        session_id: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let device_id = device_id.into();
        let dedup_key = dedup_key(&name, timestamp_ms, &device_id, &tags);
        Self {
            timestamp_ms,
            name,
            value,
            device_id,
            tags,
            session_id: session_id.into(),
            uploaded: false,
            dedup_key,
        }
    }

    pub fn numeric(
        timestamp_ms: i64,
        name: impl Into<String>,
        value: f64,
        device_id: impl Into<String>,
        tags: Tags,
        session_id: impl Into<String>,
    ) -> Self {
        Self::new(
            timestamp_ms,
            name,
            MetricValue::Numeric(value),
            device_id,
            tags,
            session_id,
        )
    }

    pub fn dedup_key_hex(&self) -> String {
        hex::encode(self.dedup_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_ignores_session_id() {
        let tags = Tags::from_pairs([("core", "all")]);
        let a = Sample::numeric(1_700_000_000_000, "cpu.usage_percent", 42.0, "d1", tags.clone(), "session-a");
        let b = Sample::numeric(1_700_000_000_000, "cpu.usage_percent", 42.0, "d1", tags, "session-b");
        assert_eq!(a.dedup_key, b.dedup_key);
    }

    #[test]
    fn dedup_key_changes_with_tags() {
        let a = Sample::numeric(1, "m", 1.0, "d", Tags::from_pairs([("a", "1")]), "s");
        let b = Sample::numeric(1, "m", 1.0, "d", Tags::from_pairs([("a", "2")]), "s");
        assert_ne!(a.dedup_key, b.dedup_key);
    }
}
