//! Persisted run-state contract.
//!
//! The JSON shape produced at the end of a run and consumed by the next run
//! (through its `control_events` / `test_events`). Cluster maps are keyed
//! by final cluster label, then by host.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::event::{ClusterLabel, Event, MessageFrequency};

/// Events keyed by provisional label, in insertion order.
pub type EventMap = IndexMap<ClusterLabel, Vec<Event>>;

/// Cluster label → host → entry.
pub type ClusterMap<T> = BTreeMap<ClusterLabel, BTreeMap<String, T>>;

/// Verdict written into `anomalous_counts` for a normal count.
pub const VERDICT_NORMAL: i8 = 1;
/// Verdict written into `anomalous_counts` for an anomalous count.
pub const VERDICT_ANOMALY: i8 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlClusterEntry {
    pub text: String,
    pub cluster_label: ClusterLabel,
    pub message_frequencies: Vec<MessageFrequency>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestClusterEntry {
    pub text: String,
    pub cluster_label: ClusterLabel,
    pub message_frequencies: Vec<MessageFrequency>,
    /// One verdict per entry of `message_frequencies`.
    #[serde(default)]
    pub anomalous_counts: Vec<i8>,
    #[serde(default)]
    pub unexpected_freq: bool,
    #[serde(default)]
    pub control_score: f64,
    #[serde(default)]
    pub test_score: f64,
    #[serde(default)]
    pub freq_score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// A test event that matched no control cluster. `cluster_label` is the
/// nearest control cluster, kept for baseline lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownEvent {
    pub text: String,
    pub cluster_label: ClusterLabel,
    pub message_frequencies: Vec<MessageFrequency>,
    pub control_score: f64,
    pub test_score: f64,
}

impl UnknownEvent {
    pub fn host(&self) -> &str {
        self.message_frequencies
            .first()
            .map(|f| f.host.as_str())
            .unwrap_or(crate::event::UNKNOWN_HOST)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownClusterEntry {
    pub text: String,
    pub cluster_label: ClusterLabel,
    pub message_frequencies: Vec<MessageFrequency>,
    pub control_score: f64,
    pub test_score: f64,
    /// Similarity of `text` to the baseline text, when a baseline exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_score: Option<f64>,
    /// Terms that differ from the baseline text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Accumulated `(test_score, weight)` pairs, consumed by scoring.
    #[serde(skip)]
    pub test_scores: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnknownScore {
    pub control_score: f64,
    pub test_score: f64,
}

impl Default for UnknownScore {
    fn default() -> Self {
        Self {
            control_score: 1.0,
            test_score: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyScore {
    pub unexpected_freq: bool,
    pub freq_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterScores {
    #[serde(default)]
    pub unknown: BTreeMap<ClusterLabel, UnknownScore>,
    #[serde(default)]
    pub test: BTreeMap<ClusterLabel, FrequencyScore>,
}

impl ClusterScores {
    pub fn is_empty(&self) -> bool {
        self.unknown.is_empty() && self.test.is_empty()
    }
}

/// Clusters acknowledged outside the current run: ones users chose to
/// ignore and ones they gave feedback on. Used as baselines when an
/// unknown cluster's nearest label is not a live control cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownClusters {
    #[serde(default)]
    pub ignored: BTreeMap<ClusterLabel, String>,
    #[serde(default)]
    pub feedback: BTreeMap<ClusterLabel, String>,
}

/// Complete output of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub control_events: EventMap,
    #[serde(default)]
    pub test_events: EventMap,
    #[serde(default)]
    pub unknown_events: Vec<Vec<UnknownEvent>>,
    #[serde(default)]
    pub control_clusters: ClusterMap<ControlClusterEntry>,
    #[serde(default)]
    pub test_clusters: ClusterMap<TestClusterEntry>,
    #[serde(default)]
    pub unknown_clusters: ClusterMap<UnknownClusterEntry>,
    #[serde(default)]
    pub cluster_scores: ClusterScores,
    #[serde(default)]
    pub score: f64,
}

impl RunState {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
