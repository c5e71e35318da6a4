//! Local file loaders for replaying and debugging runs.
//!
//! Three layouts are supported: a production export holding both windows
//! (records tagged with `logCollectionMinute` and `host`), a pair of
//! production exports with one file per window, and legacy search exports
//! where a record labelled `1` marks the start of the next minute.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use logdiff_core::raw::EventKind;
use logdiff_core::{coerce_label, LogDiffError, Result, RunState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::store::EventStore;

/// Inclusive range of collection minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteWindow {
    pub start: i64,
    pub end: i64,
}

impl MinuteWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, minute: i64) -> bool {
        self.start <= minute && minute <= self.end
    }
}

impl fmt::Display for MinuteWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

/// Parses `start,end`.
impl FromStr for MinuteWindow {
    type Err = LogDiffError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once(',')
            .ok_or_else(|| LogDiffError::Other(format!("window must be `start,end`: {s}")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<i64>()
                .map_err(|e| LogDiffError::Other(format!("invalid window bound {v:?}: {e}")))
        };
        let window = Self::new(parse(start)?, parse(end)?);
        if window.start > window.end {
            return Err(LogDiffError::Other(format!("window start after end: {s}")));
        }
        Ok(window)
    }
}

/// Read a JSON file of raw records. Accepts a bare array or an object
/// wrapping the array under `resource`.
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let contents = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&contents)? {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => match object.remove("resource") {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(LogDiffError::MalformedEvent(format!(
                "{}: expected an array of records",
                path.display()
            ))),
        },
        _ => Err(LogDiffError::MalformedEvent(format!(
            "{}: expected an array of records",
            path.display()
        ))),
    }
}

fn collection_minute(record: &Value) -> Option<i64> {
    record.get("logCollectionMinute").and_then(coerce_label)
}

fn record_host(record: &Value) -> Option<&str> {
    record.get("host").and_then(Value::as_str)
}

/// Load a production export holding both windows. A record lands on a side
/// when its minute is inside that side's window and its host is one of that
/// side's nodes. Returns the number of events added.
pub fn load_prod_file(
    store: &mut EventStore,
    path: &Path,
    control_window: MinuteWindow,
    test_window: MinuteWindow,
    control_nodes: &HashSet<String>,
    test_nodes: &HashSet<String>,
) -> Result<usize> {
    let records = read_records(path)?;
    let mut added = 0;

    for record in records {
        let Some(minute) = collection_minute(&record) else {
            debug!("skipping record without logCollectionMinute");
            continue;
        };
        let host = record_host(&record).unwrap_or_default();

        let to_control = control_window.contains(minute) && control_nodes.contains(host);
        let to_test = test_window.contains(minute) && test_nodes.contains(host);

        if to_control && to_test {
            store.add_raw(record.clone(), EventKind::ControlProd)?;
            store.add_raw(record, EventKind::TestProd)?;
            added += 2;
        } else if to_control {
            store.add_raw(record, EventKind::ControlProd)?;
            added += 1;
        } else if to_test {
            store.add_raw(record, EventKind::TestProd)?;
            added += 1;
        }
    }

    info!(path = %path.display(), added, "loaded production file");
    Ok(added)
}

/// Load control and test windows from separate production exports, without
/// host filtering.
pub fn load_prod_files(
    store: &mut EventStore,
    control_path: &Path,
    control_window: MinuteWindow,
    test_path: &Path,
    test_window: MinuteWindow,
) -> Result<usize> {
    let mut added = 0;
    for (path, window, kind) in [
        (control_path, control_window, EventKind::ControlProd),
        (test_path, test_window, EventKind::TestProd),
    ] {
        for record in read_records(path)? {
            if collection_minute(&record).is_some_and(|m| window.contains(m)) {
                store.add_raw(record, kind)?;
                added += 1;
            }
        }
    }

    info!(
        control = %control_path.display(),
        test = %test_path.display(),
        added,
        "loaded production files"
    );
    Ok(added)
}

/// Load a legacy search export. Records carry no minute of their own: the
/// minute starts at 0 and advances on every record labelled `1`. A record
/// inside both windows is added to both sides.
pub fn load_legacy_file(
    store: &mut EventStore,
    path: &Path,
    control_window: MinuteWindow,
    test_window: MinuteWindow,
) -> Result<usize> {
    let records = read_records(path)?;
    let mut minute = 0;
    let mut added = 0;

    for record in records {
        if record.get("cluster_label").and_then(coerce_label) == Some(1) {
            minute += 1;
        }
        if control_window.contains(minute) {
            store.add_raw(record.clone(), EventKind::Control)?;
            added += 1;
        }
        if test_window.contains(minute) {
            store.add_raw(record, EventKind::Test)?;
            added += 1;
        }
    }

    info!(path = %path.display(), added, minutes = minute, "loaded legacy file");
    Ok(added)
}

/// Merge the events of a previously saved run into `store`.
pub fn merge_prev_output(store: &mut EventStore, path: &Path) -> Result<usize> {
    let contents = fs::read_to_string(path)?;
    let prev = RunState::from_json(&contents)?;
    Ok(store.merge_prev_state(&prev))
}
