use logdiff_core::{ClusterLabel, Direction, LogDiffError, Result};

use super::{judge, FrequencyClassifier, Prediction, SIGMA_MULTIPLIER};

/// Classifier for baselines with spread: counts within
/// `ceil(5 × std)` of the mean are normal.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeSigma {
    mean: f64,
    std: f64,
}

impl ThreeSigma {
    pub fn fit(label: ClusterLabel, counts: &[i64]) -> Result<Self> {
        if counts.is_empty() {
            return Err(LogDiffError::EmptyCounts(label));
        }
        let (mean, std) = super::mean_std(counts);
        Ok(Self { mean, std })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }

    fn bound(&self) -> i64 {
        (SIGMA_MULTIPLIER * self.std).ceil() as i64
    }
}

impl FrequencyClassifier for ThreeSigma {
    fn name(&self) -> &'static str {
        "three_sigma"
    }

    fn predict(
        &self,
        label: ClusterLabel,
        counts: &[i64],
        direction: Direction,
    ) -> Result<Prediction> {
        judge(label, counts, self.mean, self.bound(), direction)
    }
}
