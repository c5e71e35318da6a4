//! Frequency anomaly classification.
//!
//! Each classifier is fitted on one cluster's control counts and judges
//! test counts for the same cluster. [`FrequencyAnomalyDetector`] picks the
//! classifier per cluster and owns the fitted instances for one run.
//!
//! Sub-modules:
//! - [`zero_deviation`]: baseline with (near) constant counts
//! - [`three_sigma`]: baseline with spread
//! - [`detector`]: per-label selection and dispatch

pub mod detector;
pub mod three_sigma;
pub mod zero_deviation;

use std::fmt::Debug;

use logdiff_core::{ClusterLabel, Direction, LogDiffError, Result, VERDICT_ANOMALY, VERDICT_NORMAL};

pub use detector::FrequencyAnomalyDetector;
pub use three_sigma::ThreeSigma;
pub use zero_deviation::ZeroDeviation;

/// Absolute deviation a count must exceed before it can be anomalous.
pub const ABSOLUTE_TOLERANCE: i64 = 5;

/// Below this standard deviation control counts are treated as constant.
pub const ZERO_DEVIATION_STD_CUTOFF: f64 = 0.1;

/// Relative threshold used for constant baselines.
pub const ZERO_DEVIATION_THRESHOLD: f64 = 0.25;

/// Standard deviations a count may move before it is out of bounds.
pub const SIGMA_MULTIPLIER: f64 = 5.0;

/// Verdicts for a count vector plus the fraction judged normal.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// `1` for a normal count, `-1` for an anomalous one.
    pub verdicts: Vec<i8>,
    /// `(n - anomalies) / n`.
    pub score: f64,
}

impl Prediction {
    pub fn anomaly_count(&self) -> usize {
        self.verdicts.iter().filter(|v| **v == VERDICT_ANOMALY).count()
    }

    pub fn has_anomaly(&self) -> bool {
        self.anomaly_count() > 0
    }

    /// Fraction of counts judged anomalous.
    pub fn freq_score(&self) -> f64 {
        1.0 - self.score
    }
}

/// A fitted frequency classifier for one cluster.
pub trait FrequencyClassifier: Debug + Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Judge `counts` against the fitted baseline.
    fn predict(
        &self,
        label: ClusterLabel,
        counts: &[i64],
        direction: Direction,
    ) -> Result<Prediction>;
}

/// Population mean and standard deviation.
pub(crate) fn mean_std(counts: &[i64]) -> (f64, f64) {
    if counts.is_empty() {
        return (0.0, 0.0);
    }
    let n = counts.len() as f64;
    let mean = counts.iter().map(|c| *c as f64).sum::<f64>() / n;
    let variance = counts
        .iter()
        .map(|c| {
            let diff = *c as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Whether a single count is anomalous given the baseline mean and the
/// magnitude bound. Both the tolerance gate and the bound must be exceeded.
pub(crate) fn is_anomalous(value: i64, mean: f64, bound: i64, direction: Direction) -> bool {
    let value = value as f64;
    let magnitude = (value - mean).abs().floor() as i64;
    if magnitude <= ABSOLUTE_TOLERANCE {
        return false;
    }
    match direction {
        Direction::Higher => (value - mean).floor() as i64 > bound,
        Direction::Lower => (mean - value).floor() as i64 > bound,
        Direction::Both => magnitude > bound,
    }
}

/// Judge every count and compute the normal fraction.
pub(crate) fn judge(
    label: ClusterLabel,
    counts: &[i64],
    mean: f64,
    bound: i64,
    direction: Direction,
) -> Result<Prediction> {
    if counts.is_empty() {
        return Err(LogDiffError::EmptyCounts(label));
    }

    let verdicts: Vec<i8> = counts
        .iter()
        .map(|&c| {
            if is_anomalous(c, mean, bound, direction) {
                VERDICT_ANOMALY
            } else {
                VERDICT_NORMAL
            }
        })
        .collect();

    let n = verdicts.len();
    let anomalies = verdicts.iter().filter(|v| **v == VERDICT_ANOMALY).count();

    Ok(Prediction {
        verdicts,
        score: (n - anomalies) as f64 / n as f64,
    })
}
