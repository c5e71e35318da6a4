use std::collections::HashMap;

use logdiff_core::{ClusterLabel, Direction, LogDiffError, Result};
use tracing::debug;

use super::{
    mean_std, FrequencyClassifier, Prediction, ThreeSigma, ZeroDeviation,
    ZERO_DEVIATION_STD_CUTOFF, ZERO_DEVIATION_THRESHOLD,
};

/// Chooses a classifier per cluster label and keeps the fitted instances
/// for the lifetime of one run.
#[derive(Debug)]
pub struct FrequencyAnomalyDetector {
    zero_deviation_threshold: f64,
    classifiers: HashMap<ClusterLabel, Box<dyn FrequencyClassifier>>,
}

impl Default for FrequencyAnomalyDetector {
    fn default() -> Self {
        Self::new(ZERO_DEVIATION_THRESHOLD)
    }
}

impl FrequencyAnomalyDetector {
    pub fn new(zero_deviation_threshold: f64) -> Self {
        Self {
            zero_deviation_threshold,
            classifiers: HashMap::new(),
        }
    }

    /// Fit a classifier for `label` on its control counts, replacing any
    /// earlier fit. Constant baselines (std below 0.1) get the
    /// zero-deviation classifier, everything else three-sigma.
    pub fn fit(&mut self, label: ClusterLabel, control_counts: &[i64]) -> Result<()> {
        let (mean, std) = mean_std(control_counts);
        let classifier: Box<dyn FrequencyClassifier> = if std < ZERO_DEVIATION_STD_CUTOFF {
            Box::new(ZeroDeviation::fit(
                label,
                control_counts,
                self.zero_deviation_threshold,
            )?)
        } else {
            Box::new(ThreeSigma::fit(label, control_counts)?)
        };

        debug!(
            label,
            mean,
            std,
            classifier = classifier.name(),
            "fitted frequency classifier"
        );
        self.classifiers.insert(label, classifier);
        Ok(())
    }

    /// Judge test counts for a previously fitted label.
    pub fn predict(
        &self,
        label: ClusterLabel,
        test_counts: &[i64],
        direction: Direction,
    ) -> Result<Prediction> {
        let classifier = self
            .classifiers
            .get(&label)
            .ok_or(LogDiffError::NotFitted(label))?;
        classifier.predict(label, test_counts, direction)
    }

    pub fn is_fitted(&self, label: ClusterLabel) -> bool {
        self.classifiers.contains_key(&label)
    }

    /// Name of the classifier chosen for `label`, if fitted.
    pub fn classifier_name(&self, label: ClusterLabel) -> Option<&'static str> {
        self.classifiers.get(&label).map(|c| c.name())
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_baseline_selects_zero_deviation() {
        let mut detector = FrequencyAnomalyDetector::default();
        detector.fit(1, &[10, 10, 10]).unwrap();
        assert_eq!(detector.classifier_name(1), Some("zero_deviation"));
    }

    #[test]
    fn spread_baseline_selects_three_sigma() {
        let mut detector = FrequencyAnomalyDetector::default();
        detector.fit(1, &[9, 11]).unwrap();
        assert_eq!(detector.classifier_name(1), Some("three_sigma"));
    }

    #[test]
    fn std_cutoff_splits_near_constant_series() {
        // 99 ones and a two: std ≈ 0.0995. 97 ones and a two: std ≈ 0.1005.
        let mut counts = vec![1; 99];
        counts.push(2);
        let mut detector = FrequencyAnomalyDetector::default();
        detector.fit(1, &counts).unwrap();
        assert_eq!(detector.classifier_name(1), Some("zero_deviation"));

        let mut counts = vec![1; 97];
        counts.push(2);
        detector.fit(2, &counts).unwrap();
        assert_eq!(detector.classifier_name(2), Some("three_sigma"));
    }

    #[test]
    fn uses_configured_zero_deviation_threshold() {
        let mut detector = FrequencyAnomalyDetector::new(0.05);
        detector.fit(3, &[7, 7, 7]).unwrap();
        let prediction = detector.predict(3, &[13], Direction::Higher).unwrap();
        assert_eq!(prediction.verdicts, vec![-1]);
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        let detector = FrequencyAnomalyDetector::default();
        let err = detector.predict(5, &[1], Direction::Both).unwrap_err();
        assert!(matches!(err, LogDiffError::NotFitted(5)));
    }

    #[test]
    fn empty_control_counts_are_rejected() {
        let mut detector = FrequencyAnomalyDetector::default();
        assert!(matches!(
            detector.fit(6, &[]),
            Err(LogDiffError::EmptyCounts(6))
        ));
        assert!(!detector.is_fitted(6));
    }

    #[test]
    fn refit_replaces_classifier() {
        let mut detector = FrequencyAnomalyDetector::default();
        detector.fit(1, &[5, 5]).unwrap();
        detector.fit(1, &[1, 9]).unwrap();
        assert_eq!(detector.len(), 1);
        assert_eq!(detector.classifier_name(1), Some("three_sigma"));
    }
}
