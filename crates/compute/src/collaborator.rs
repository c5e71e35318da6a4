//! Seams to the text-processing collaborators.
//!
//! The engine never vectorizes or compares text itself. It hands
//! `(label, text)` pairs to a [`TextClusterer`] and gets assignments back
//! keyed by the same labels, so nothing depends on positional alignment.
//! Default implementations live in [`crate::algorithms`].

use std::collections::HashMap;

use logdiff_core::{ClusterLabel, FeatureFilter, Result};

/// A representative text together with the label it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledText {
    pub label: ClusterLabel,
    pub text: String,
}

impl LabeledText {
    pub fn new(label: ClusterLabel, text: impl Into<String>) -> Self {
        Self {
            label,
            text: text.into(),
        }
    }
}

/// Result of clustering a set of labelled texts.
#[derive(Debug, Clone)]
pub struct Clustering<M> {
    /// Input label → assigned cluster id.
    pub assignments: HashMap<ClusterLabel, ClusterLabel>,
    /// Cluster id → top terms, most significant first.
    pub tags: HashMap<ClusterLabel, Vec<String>>,
    /// Trained model used to match further texts against these clusters.
    pub model: M,
}

impl<M> Clustering<M> {
    pub fn cluster_of(&self, label: ClusterLabel) -> Option<ClusterLabel> {
        self.assignments.get(&label).copied()
    }

    pub fn tags_for(&self, cluster: ClusterLabel, max_tags: usize) -> Vec<String> {
        self.tags
            .get(&cluster)
            .map(|tags| tags.iter().take(max_tags).cloned().collect())
            .unwrap_or_default()
    }
}

/// How a test text relates to the control clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    /// Whether the text is an acceptable member of `matched_label`.
    pub matched: bool,
    /// Nearest control cluster; reported even when `matched` is false.
    pub matched_label: Option<ClusterLabel>,
    /// Baseline match score of the nearest control cluster, in [0, 1].
    pub cluster_score: f64,
    /// The text's own match score against that cluster. Its distance from
    /// `cluster_score` is the text's dissimilarity.
    pub score: f64,
}

/// Text clustering collaborator.
pub trait TextClusterer {
    type Model;

    /// Cluster `texts`. `corpus` is the full document set the feature space
    /// is built from; it includes `texts`.
    ///
    /// Fails with `LogDiffError::EmptyVocabulary` when `filter` prunes every
    /// term.
    fn cluster(
        &self,
        texts: &[LabeledText],
        corpus: &[LabeledText],
        filter: FeatureFilter,
    ) -> Result<Clustering<Self::Model>>;

    /// Match each text against the clusters captured in `model`.
    fn classify(
        &self,
        model: &Self::Model,
        texts: &[LabeledText],
    ) -> Result<HashMap<ClusterLabel, MatchOutcome>>;

    /// Pairwise distances between `texts`, in [0, 1].
    fn distance_matrix(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;

    /// Project a distance matrix to one 2-D point per row.
    fn project(&self, distances: &[Vec<f64>]) -> Result<Vec<(f64, f64)>>;
}

/// Text similarity and diff collaborator.
pub trait TextSimilarity {
    /// Similarity of each candidate to `base`, in [0, 1].
    fn similarity(&self, base: &str, candidates: &[&str]) -> Vec<f64>;

    /// Terms that differ between `base` and each candidate.
    fn diff(&self, base: &str, candidates: &[&str]) -> Vec<Vec<String>>;
}
