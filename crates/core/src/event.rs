use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Cluster label, either producer-assigned or assigned by a clustering pass.
pub type ClusterLabel = i64;

/// Host name recorded when a producer does not report one.
pub const UNKNOWN_HOST: &str = "Unknown";

/// Time bucket as reported by the producer.
///
/// Producers emit epoch minutes, fractional epoch seconds or formatted
/// timestamps; the value is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBucket {
    Minute(i64),
    Instant(f64),
    Label(String),
}

/// One occurrence record: how many times a message shape was seen on a
/// host within one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageFrequency {
    #[serde(default, deserialize_with = "deserialize_count")]
    pub count: i64,
    #[serde(default, alias = "timestamp")]
    pub time: Option<TimeBucket>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default, alias = "original_label", deserialize_with = "deserialize_opt_label")]
    pub old_label: Option<ClusterLabel>,
}

/// A single observed message shape with its occurrence records.
///
/// `control_score` and `test_score` are written in place when a test event
/// is matched against the control clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(deserialize_with = "deserialize_label")]
    pub cluster_label: ClusterLabel,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub message_frequencies: Vec<MessageFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_score: Option<f64>,
}

impl Event {
    pub fn new(cluster_label: ClusterLabel, text: impl Into<String>) -> Self {
        Self {
            cluster_label,
            text: text.into(),
            message_frequencies: Vec::new(),
            control_score: None,
            test_score: None,
        }
    }

    /// Attach one occurrence record.
    pub fn with_frequency(mut self, count: i64, time: Option<TimeBucket>, host: &str) -> Self {
        self.message_frequencies.push(MessageFrequency {
            count,
            time,
            host: host.to_string(),
            old_label: Some(self.cluster_label),
        });
        self
    }

    /// Host of the first occurrence record; an event belongs to one host.
    pub fn host(&self) -> &str {
        self.message_frequencies
            .first()
            .map(|f| f.host.as_str())
            .unwrap_or(UNKNOWN_HOST)
    }

    pub fn counts(&self) -> Vec<i64> {
        self.message_frequencies.iter().map(|f| f.count).collect()
    }
}

/// Mean occurrence count, or 0.0 when there are no records.
pub fn mean_count(frequencies: &[MessageFrequency]) -> f64 {
    if frequencies.is_empty() {
        return 0.0;
    }
    let total: i64 = frequencies.iter().map(|f| f.count).sum();
    total as f64 / frequencies.len() as f64
}

pub(crate) fn default_host() -> String {
    UNKNOWN_HOST.to_string()
}

/// Coerce a JSON value into a cluster label. Accepts integers, integral
/// floats and numeric strings.
pub fn coerce_label(value: &Value) -> Option<ClusterLabel> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerce a JSON value into an occurrence count. Fractional values are
/// truncated; anything non-numeric counts as zero.
pub fn coerce_count(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_count(&value))
}

fn deserialize_label<'de, D>(deserializer: D) -> Result<ClusterLabel, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_label(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid cluster label: {}", value)))
}

fn deserialize_opt_label<'de, D>(deserializer: D) -> Result<Option<ClusterLabel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_label(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_defaults_to_unknown() {
        let event = Event::new(3, "disk full");
        assert_eq!(event.host(), UNKNOWN_HOST);

        let event = event.with_frequency(4, None, "web-1");
        assert_eq!(event.host(), "web-1");
    }

    #[test]
    fn mean_count_handles_empty() {
        let event = Event::new(1, "x");
        assert_eq!(mean_count(&event.message_frequencies), 0.0);

        let event = event
            .with_frequency(2, None, "h")
            .with_frequency(4, None, "h");
        assert_eq!(mean_count(&event.message_frequencies), 3.0);
    }

    #[test]
    fn counts_are_coerced_from_strings_and_floats() {
        assert_eq!(coerce_count(&json!("12")), 12);
        assert_eq!(coerce_count(&json!(7.9)), 7);
        assert_eq!(coerce_count(&json!(" 3.0 ")), 3);
        assert_eq!(coerce_count(&json!(null)), 0);
    }

    #[test]
    fn labels_accept_numeric_strings() {
        assert_eq!(coerce_label(&json!("42")), Some(42));
        assert_eq!(coerce_label(&json!(42.0)), Some(42));
        assert_eq!(coerce_label(&json!(4.5)), None);
        assert_eq!(coerce_label(&json!("abc")), None);
    }

    #[test]
    fn frequency_accepts_long_field_names() {
        let freq: MessageFrequency = serde_json::from_value(json!({
            "count": "5",
            "timestamp": 1700,
            "original_label": "9"
        }))
        .unwrap();
        assert_eq!(freq.count, 5);
        assert_eq!(freq.time, Some(TimeBucket::Minute(1700)));
        assert_eq!(freq.host, UNKNOWN_HOST);
        assert_eq!(freq.old_label, Some(9));
    }

    #[test]
    fn scores_are_omitted_until_assigned() {
        let event = Event::new(1, "x").with_frequency(1, None, "h");
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("control_score").is_none());
        assert!(value.get("test_score").is_none());
    }
}
