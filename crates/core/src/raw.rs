//! Source-format adapters.
//!
//! Producers report events in three shapes: the search-export shape
//! (`cluster_label`, `_raw`, `cluster_count`, `_time`), the production
//! shape (`clusterLabel`, `logMessage`, `count`, `timeStamp`), and the
//! saved shape of a previous run. [`normalize`] turns any of them into one
//! canonical [`Event`] so the event store never branches on format.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LogDiffError, Result};
use crate::event::{coerce_count, coerce_label, Event, MessageFrequency, TimeBucket, UNKNOWN_HOST};

/// Which window an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Control,
    Test,
}

/// Origin of a raw event: its window plus the shape it arrives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Control,
    Test,
    ControlProd,
    TestProd,
    ControlPrev,
    TestPrev,
}

impl EventKind {
    pub fn side(self) -> Side {
        match self {
            EventKind::Control | EventKind::ControlProd | EventKind::ControlPrev => Side::Control,
            EventKind::Test | EventKind::TestProd | EventKind::TestPrev => Side::Test,
        }
    }

    /// Whether the event comes from a previous run's saved state.
    pub fn is_prev(self) -> bool {
        matches!(self, EventKind::ControlPrev | EventKind::TestPrev)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Control => "control",
            EventKind::Test => "test",
            EventKind::ControlProd => "control_prod",
            EventKind::TestProd => "test_prod",
            EventKind::ControlPrev => "control_prev",
            EventKind::TestPrev => "test_prev",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = LogDiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "control" => Ok(EventKind::Control),
            "test" => Ok(EventKind::Test),
            "control_prod" => Ok(EventKind::ControlProd),
            "test_prod" => Ok(EventKind::TestProd),
            "control_prev" => Ok(EventKind::ControlPrev),
            "test_prev" => Ok(EventKind::TestPrev),
            other => Err(LogDiffError::Other(format!("unknown event kind: {}", other))),
        }
    }
}

/// Search-export record.
#[derive(Debug, Deserialize)]
struct ExportRecord {
    cluster_label: Value,
    #[serde(rename = "_raw", default)]
    raw: Option<String>,
    #[serde(default)]
    cluster_count: Value,
    #[serde(rename = "_time", default)]
    time: Option<TimeBucket>,
    #[serde(default)]
    host: Option<String>,
}

/// Production record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProdRecord {
    cluster_label: Value,
    #[serde(default)]
    log_message: Option<String>,
    #[serde(default)]
    count: Value,
    #[serde(default)]
    time_stamp: Option<TimeBucket>,
    #[serde(default)]
    host: Option<String>,
}

/// Convert a raw JSON record of the given kind into a canonical [`Event`].
///
/// The returned event keeps the producer's label; offsetting labels of
/// previous-run events is the store's concern.
pub fn normalize(value: Value, kind: EventKind) -> Result<Event> {
    match kind {
        EventKind::Control | EventKind::Test => {
            let record: ExportRecord = serde_json::from_value(value)?;
            let label = label_of(&record.cluster_label)?;
            Ok(single_record_event(
                label,
                record.raw,
                coerce_count(&record.cluster_count),
                record.time,
                record.host,
            ))
        }
        EventKind::ControlProd | EventKind::TestProd => {
            let record: ProdRecord = serde_json::from_value(value)?;
            let label = label_of(&record.cluster_label)?;
            Ok(single_record_event(
                label,
                record.log_message,
                coerce_count(&record.count),
                record.time_stamp,
                record.host,
            ))
        }
        EventKind::ControlPrev | EventKind::TestPrev => Ok(serde_json::from_value(value)?),
    }
}

fn label_of(value: &Value) -> Result<i64> {
    coerce_label(value)
        .ok_or_else(|| LogDiffError::MalformedEvent(format!("invalid cluster label: {}", value)))
}

fn single_record_event(
    label: i64,
    text: Option<String>,
    count: i64,
    time: Option<TimeBucket>,
    host: Option<String>,
) -> Event {
    Event {
        cluster_label: label,
        text: text.unwrap_or_default(),
        message_frequencies: vec![MessageFrequency {
            count,
            time,
            host: host.unwrap_or_else(|| UNKNOWN_HOST.to_string()),
            old_label: Some(label),
        }],
        control_score: None,
        test_score: None,
    }
}
