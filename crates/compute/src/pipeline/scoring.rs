use logdiff_core::ClusterScores;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Global deviation of a run.
///
/// Unknown clusters contribute `(control_score, 1 - test_score)` and
/// frequency-anomalous clusters `(1.0, 1 - freq_score)`. The score is the
/// Euclidean distance between the two resulting vectors, rounded to two
/// decimals, and `0.0` when there is nothing to score.
pub fn global_score(scores: &ClusterScores) -> f64 {
    let pairs: Vec<(f64, f64)> = scores
        .unknown
        .values()
        .map(|s| (s.control_score, 1.0 - s.test_score))
        .chain(scores.test.values().map(|s| (1.0, 1.0 - s.freq_score)))
        .collect();

    if pairs.is_empty() {
        return 0.0;
    }

    let distance = pairs
        .iter()
        .map(|(control, test)| (control - test).powi(2))
        .sum::<f64>()
        .sqrt();
    round2(distance)
}
