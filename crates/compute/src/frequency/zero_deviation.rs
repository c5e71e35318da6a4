use logdiff_core::{ClusterLabel, Direction, LogDiffError, Result};

use super::{judge, FrequencyClassifier, Prediction};

/// Classifier for baselines whose counts are (nearly) constant.
///
/// The magnitude bound is `ceil(threshold × mean)`: a relative tolerance
/// around the baseline mean.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroDeviation {
    mean: f64,
    threshold: f64,
}

impl ZeroDeviation {
    pub fn fit(label: ClusterLabel, counts: &[i64], threshold: f64) -> Result<Self> {
        if counts.is_empty() {
            return Err(LogDiffError::EmptyCounts(label));
        }
        let (mean, _) = super::mean_std(counts);
        Ok(Self { mean, threshold })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    fn bound(&self) -> i64 {
        (self.threshold * self.mean).ceil() as i64
    }
}

impl FrequencyClassifier for ZeroDeviation {
    fn name(&self) -> &'static str {
        "zero_deviation"
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
