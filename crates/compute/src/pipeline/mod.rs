//! Differential clustering orchestrator.
//!
//! Drives one run from raw control/test events to scored clusters:
//!
//! 1. Guard against empty or oversized baselines.
//! 2. Cluster control texts and match test texts against them.
//! 3. Re-label events into control, test and unknown clusters.
//! 4. Deduplicate unknowns with a secondary clustering pass and score them.
//! 5. Attach alert scores and diffs against baseline texts.
//! 6. Run frequency anomaly detection on matched test clusters.
//! 7. Roll everything into the global score, then lay clusters out in 2-D.
//!
//! Sub-modules:
//! - [`clusters`]: re-labelling events into cluster maps
//! - [`unknown`]: unknown-cluster grouping, scoring and alerting
//! - [`counts`]: frequency anomaly pass
//! - [`scoring`]: global score
//! - [`layout`]: 2-D positions for visualization

pub mod clusters;
pub mod counts;
pub mod layout;
pub mod scoring;
pub mod unknown;

use std::collections::HashMap;
use std::fmt;

use logdiff_core::{
    AnalysisConfig, ClusterLabel, ClusterMap, ClusterScores, ControlClusterEntry, FeatureFilter,
    KnownClusters, LogDiffError, Result, RunState, TestClusterEntry, UnknownClusterEntry,
    UnknownEvent,
};
use tracing::{info, warn};

use crate::algorithms::{NgramSimilarity, ThresholdClusterer};
use crate::collaborator::{Clustering, LabeledText, TextClusterer, TextSimilarity};
use crate::frequency::FrequencyAnomalyDetector;
use crate::store::EventStore;

// ── Re-exports ────────────────────────────────────────────────────────
pub use scoring::{global_score, round2};

/// First synthetic label handed to an unmatched test event. Every label
/// below it is a real cluster from the clustering collaborator.
pub const UNKNOWN_LABEL_BASE: ClusterLabel = 1_000_000;

/// Whether `label` names a real cluster rather than a synthetic unknown.
pub fn is_real_label(label: ClusterLabel) -> bool {
    label < UNKNOWN_LABEL_BASE
}

/// Why a run did not analyze anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoControlEvents,
    TooManyClusters { clusters: usize, limit: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoControlEvents => write!(f, "no control events"),
            SkipReason::TooManyClusters { clusters, limit } => {
                write!(f, "too many control clusters ({clusters} > {limit}), skipped")
            }
        }
    }
}

/// Outcome of [`DiffClustering::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed {
        score: f64,
        unknown_clusters: usize,
        frequency_anomalies: usize,
    },
    Skipped(SkipReason),
}

impl RunStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RunStatus::Skipped(_))
    }
}

/// One differential clustering run over an [`EventStore`].
///
/// Owns the store, the collaborators and every derived structure. Call
/// [`run`](Self::run) once, then read results through the accessors or
/// take them with [`into_state`](Self::into_state).
pub struct DiffClustering<C: TextClusterer, S: TextSimilarity> {
    store: EventStore,
    clusterer: C,
    similarity: S,
    config: AnalysisConfig,
    known: KnownClusters,
    query: Option<String>,
    detector: FrequencyAnomalyDetector,
    control_clusters: ClusterMap<ControlClusterEntry>,
    test_clusters: ClusterMap<TestClusterEntry>,
    anomalies: Vec<Vec<UnknownEvent>>,
    anom_clusters: ClusterMap<UnknownClusterEntry>,
    cluster_scores: ClusterScores,
    score: f64,
}

impl DiffClustering<ThresholdClusterer, NgramSimilarity> {
    /// Orchestrator wired to the built-in collaborators.
    pub fn with_default_collaborators(store: EventStore, config: AnalysisConfig) -> Self {
        let clusterer = ThresholdClusterer::new(config.match_threshold);
        Self::new(store, clusterer, NgramSimilarity::default(), config)
    }
}

impl<C: TextClusterer, S: TextSimilarity> DiffClustering<C, S> {
    pub fn new(store: EventStore, clusterer: C, similarity: S, config: AnalysisConfig) -> Self {
        let detector = FrequencyAnomalyDetector::new(config.zero_deviation_threshold);
        Self {
            store,
            clusterer,
            similarity,
            config,
            known: KnownClusters::default(),
            query: None,
            detector,
            control_clusters: ClusterMap::new(),
            test_clusters: ClusterMap::new(),
            anomalies: Vec::new(),
            anom_clusters: ClusterMap::new(),
            cluster_scores: ClusterScores::default(),
            score: 0.0,
        }
    }

    /// Previously ignored and feedback clusters used as alert baselines.
    pub fn with_known_clusters(mut self, known: KnownClusters) -> Self {
        self.known = known;
        self
    }

    /// Query string echoed into the output.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn run(&mut self) -> Result<RunStatus> {
        let control_labels = self.store.control_events().len();
        let test_labels = self.store.test_events().len();

        if control_labels == 0 {
            warn!("no control events, nothing to compare against");
            return Ok(RunStatus::Skipped(SkipReason::NoControlEvents));
        }
        if control_labels > self.config.cluster_limit {
            let reason = SkipReason::TooManyClusters {
                clusters: control_labels,
                limit: self.config.cluster_limit,
            };
            warn!(%reason, "skipping run");
            return Ok(RunStatus::Skipped(reason));
        }

        info!(control_labels, test_labels, "starting differential clustering");

        let control_texts = self.store.control_texts();
        let test_texts = self.store.test_texts();
        let corpus = self.store.all_texts();

        let clustering = self.cluster_with_retry(&control_texts, &corpus)?;
        let outcomes = if test_texts.is_empty() {
            info!("no test events, baseline-only run");
            HashMap::new()
        } else {
            self.clusterer.classify(&clustering.model, &test_texts)?
        };

        self.control_clusters = clusters::build_control_clusters(
            self.store.control_events_mut(),
            &clustering,
            self.config.max_tags,
        )?;
        let labelled = clusters::build_test_clusters(
            self.store.test_events_mut(),
            &outcomes,
            &clustering,
            self.config.max_tags,
        )?;
        self.test_clusters = labelled.test_clusters;
        self.anomalies = labelled.anomalies;

        self.build_unknown_clusters()?;
        unknown::attach_alert_scores(
            &self.similarity,
            &mut self.anom_clusters,
            &self.control_clusters,
            &self.known,
            self.config.diff_band,
        );

        self.cluster_scores.test = counts::detect_frequency_anomalies(
            &mut self.detector,
            &self.control_clusters,
            &mut self.test_clusters,
            self.config.direction,
        )?;

        self.score = global_score(&self.cluster_scores);

        self.apply_layout();

        info!(
            control_clusters = self.control_clusters.len(),
            test_clusters = self.test_clusters.len(),
            unknown_clusters = self.anom_clusters.len(),
            frequency_anomalies = self.cluster_scores.test.len(),
            score = self.score,
            "differential clustering complete"
        );

        Ok(RunStatus::Completed {
            score: self.score,
            unknown_clusters: self.anom_clusters.len(),
            frequency_anomalies: self.cluster_scores.test.len(),
        })
    }

    /// Cluster `texts`, retrying once with a relaxed document-frequency
    /// filter when the configured one leaves no features.
    fn cluster_with_retry(
        &self,
        texts: &[LabeledText],
        corpus: &[LabeledText],
    ) -> Result<Clustering<C::Model>> {
        match self
            .clusterer
            .cluster(texts, corpus, self.config.feature_filter)
        {
            Err(LogDiffError::EmptyVocabulary(reason)) => {
                warn!(%reason, "no features extracted, retrying with relaxed filter");
                self.clusterer
                    .cluster(texts, corpus, FeatureFilter::relaxed())
            }
            other => other,
        }
    }

    fn build_unknown_clusters(&mut self) -> Result<()> {
        if self.anomalies.is_empty() {
            return Ok(());
        }

        let texts = unknown::group_texts(&self.anomalies);
        let assignments = match self.cluster_with_retry(&texts, &texts) {
            Ok(clustering) => clustering.assignments,
            Err(LogDiffError::EmptyVocabulary(reason)) => {
                warn!(
                    %reason,
                    groups = texts.len(),
                    "unknown texts have no features, keeping one cluster per group"
                );
                unknown::singleton_assignments(&texts)
            }
            Err(e) => return Err(e),
        };

        let (mut anom_clusters, mut scores) =
            unknown::group_unknown_events(&self.anomalies, &assignments)?;
        unknown::score_unknown_events(&mut anom_clusters, &mut scores);

        info!(
            groups = self.anomalies.len(),
            clusters = anom_clusters.len(),
            "grouped unknown events"
        );
        self.anom_clusters = anom_clusters;
        self.cluster_scores.unknown = scores;
        Ok(())
    }

    fn apply_layout(&mut self) {
        let texts = layout::layout_texts(
            &self.control_clusters,
            &self.test_clusters,
            &self.anom_clusters,
        );
        if texts.is_empty() {
            return;
        }

        let points = match self
            .clusterer
            .distance_matrix(&texts)
            .and_then(|distances| self.clusterer.project(&distances))
        {
            Ok(points) => points,
            Err(e) => {
                warn!(error = %e, "layout failed, leaving positions unset");
                return;
            }
        };

        if points.len() != texts.len() {
            warn!(
                expected = texts.len(),
                got = points.len(),
                "layout returned wrong number of points, leaving positions unset"
            );
            return;
        }

        layout::apply_positions(
            &points,
            &mut self.control_clusters,
            &mut self.test_clusters,
            &mut self.anom_clusters,
        );
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn control_clusters(&self) -> &ClusterMap<ControlClusterEntry> {
        &self.control_clusters
    }

    pub fn test_clusters(&self) -> &ClusterMap<TestClusterEntry> {
        &self.test_clusters
    }

    /// Unmatched test events grouped by their original label.
    pub fn anomalies(&self) -> &[Vec<UnknownEvent>] {
        &self.anomalies
    }

    pub fn anom_clusters(&self) -> &ClusterMap<UnknownClusterEntry> {
        &self.anom_clusters
    }

    pub fn cluster_scores(&self) -> &ClusterScores {
        &self.cluster_scores
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn detector(&self) -> &FrequencyAnomalyDetector {
        &self.detector
    }

    /// Consume the run into its persisted output shape.
    pub fn into_state(self) -> RunState {
        let (control_events, test_events) = self.store.into_parts();
        RunState {
            query: self.query,
            control_events,
            test_events,
            unknown_events: self.anomalies,
            control_clusters: self.control_clusters,
            test_clusters: self.test_clusters,
            unknown_clusters: self.anom_clusters,
            cluster_scores: self.cluster_scores,
            score: self.score,
        }
    }
}
