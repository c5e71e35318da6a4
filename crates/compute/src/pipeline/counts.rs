use std::collections::BTreeMap;

use logdiff_core::{
    ClusterLabel, ClusterMap, ControlClusterEntry, Direction, FrequencyScore, Result,
    TestClusterEntry,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::is_real_label;
use crate::frequency::{FrequencyAnomalyDetector, Prediction};

/// Judge every matched test cluster's per-host counts against the pooled
/// control counts of the same cluster.
///
/// Fitting happens up front on the calling thread; predictions fan out
/// across the rayon pool and are merged back in label order. Returns the
/// cluster-level score of every cluster with at least one unexpected host.
pub fn detect_frequency_anomalies(
    detector: &mut FrequencyAnomalyDetector,
    control: &ClusterMap<ControlClusterEntry>,
    test: &mut ClusterMap<TestClusterEntry>,
    direction: Direction,
) -> Result<BTreeMap<ClusterLabel, FrequencyScore>> {
    for label in test.keys().copied().filter(|l| is_real_label(*l)) {
        let control_counts: Vec<i64> = control
            .get(&label)
            .map(|hosts| {
                hosts
                    .values()
                    .flat_map(|entry| entry.message_frequencies.iter().map(|f| f.count))
                    .collect()
            })
            .unwrap_or_default();

        if control_counts.is_empty() {
            warn!(label, "no control counts for matched cluster, skipping frequency check");
            continue;
        }
        detector.fit(label, &control_counts)?;
    }

    if detector.is_empty() {
        return Ok(BTreeMap::new());
    }

    let detector = &*detector;
    let jobs: Vec<(ClusterLabel, String, Vec<i64>)> = test
        .iter()
        .filter(|(label, _)| detector.is_fitted(**label))
        .flat_map(|(label, hosts)| {
            hosts.iter().map(move |(host, entry)| {
                let counts: Vec<i64> =
                    entry.message_frequencies.iter().map(|f| f.count).collect();
                (*label, host.clone(), counts)
            })
        })
        .filter(|(_, _, counts)| !counts.is_empty())
        .collect();

    debug!(
        fitted = detector.len(),
        jobs = jobs.len(),
        "predicting frequency anomalies"
    );

    let predictions: Vec<Result<(ClusterLabel, String, Prediction)>> = jobs
        .into_par_iter()
        .map(|(label, host, counts)| {
            detector
                .predict(label, &counts, direction)
                .map(|prediction| (label, host, prediction))
        })
        .collect();

    let mut by_label: BTreeMap<ClusterLabel, Vec<(String, Prediction)>> = BTreeMap::new();
    for result in predictions {
        let (label, host, prediction) = result?;
        by_label.entry(label).or_default().push((host, prediction));
    }

    let mut scores = BTreeMap::new();
    for (label, predictions) in by_label {
        let Some(hosts) = test.get_mut(&label) else {
            continue;
        };

        let mut unexpected = false;
        let mut max_freq_score = 0.0;
        for (host, prediction) in predictions {
            let Some(entry) = hosts.get_mut(&host) else {
                continue;
            };
            entry.unexpected_freq = prediction.has_anomaly();
            entry.freq_score = prediction.freq_score();
            entry.anomalous_counts = prediction.verdicts;

            unexpected |= entry.unexpected_freq;
            if entry.freq_score > max_freq_score {
                max_freq_score = entry.freq_score;
            }
        }

        if unexpected {
            scores.insert(
                label,
                FrequencyScore {
                    unexpected_freq: true,
                    freq_score: max_freq_score,
                },
            );
        }
    }

    if !scores.is_empty() {
        info!(clusters = scores.len(), "frequency anomalies detected");
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logdiff_core::MessageFrequency;

    fn frequencies(host: &str, counts: &[i64]) -> Vec<MessageFrequency> {
        counts
            .iter()
            .map(|c| MessageFrequency {
                count: *c,
                time: None,
                host: host.to_string(),
                old_label: None,
            })
            .collect()
    }

    fn control_entry(host: &str, counts: &[i64]) -> ControlClusterEntry {
        ControlClusterEntry {
            text: "request served".to_string(),
            cluster_label: 0,
            message_frequencies: frequencies(host, counts),
            tags: Vec::new(),
            x: None,
            y: None,
        }
    }

    fn test_entry(host: &str, counts: &[i64]) -> TestClusterEntry {
        TestClusterEntry {
            text: "request served".to_string(),
            cluster_label: 0,
            message_frequencies: frequencies(host, counts),
            anomalous_counts: Vec::new(),
            unexpected_freq: false,
            control_score: 1.0,
            test_score: 1.0,
            freq_score: 0.0,
            tags: Vec::new(),
            x: None,
            y: None,
        }
    }

    #[test]
    fn spike_on_one_host_is_flagged() {
        let mut control = ClusterMap::new();
        control.insert(
            0,
            BTreeMap::from([
                ("h1".to_string(), control_entry("h1", &[10, 10, 10])),
                ("h2".to_string(), control_entry("h2", &[10, 10, 10])),
            ]),
        );
        let mut test = ClusterMap::new();
        test.insert(
            0,
            BTreeMap::from([
                ("h1".to_string(), test_entry("h1", &[50])),
                ("h2".to_string(), test_entry("h2", &[11])),
            ]),
        );

        let mut detector = FrequencyAnomalyDetector::default();
        let scores =
            detect_frequency_anomalies(&mut detector, &control, &mut test, Direction::Higher)
                .unwrap();

        let h1 = &test[&0]["h1"];
        assert!(h1.unexpected_freq);
        assert_eq!(h1.anomalous_counts, vec![-1]);
        assert_eq!(h1.freq_score, 1.0);

        let h2 = &test[&0]["h2"];
        assert!(!h2.unexpected_freq);
        assert_eq!(h2.anomalous_counts, vec![1]);
        assert_eq!(h2.freq_score, 0.0);

        assert_eq!(
            scores[&0],
            FrequencyScore {
                unexpected_freq: true,
                freq_score: 1.0
            }
        );
        assert_eq!(detector.classifier_name(0), Some("zero_deviation"));
    }

    #[test]
    fn normal_clusters_are_not_scored() {
        let mut control = ClusterMap::new();
        control.insert(0, BTreeMap::from([("h1".to_string(), control_entry("h1", &[5, 9, 7]))]));
        let mut test = ClusterMap::new();
        test.insert(0, BTreeMap::from([("h1".to_string(), test_entry("h1", &[8, 6]))]));

        let mut detector = FrequencyAnomalyDetector::default();
        let scores =
            detect_frequency_anomalies(&mut detector, &control, &mut test, Direction::Both)
                .unwrap();
        assert!(scores.is_empty());
        assert_eq!(test[&0]["h1"].anomalous_counts, vec![1, 1]);
    }

    #[test]
    fn clusters_without_control_counts_are_skipped() {
        let control = ClusterMap::new();
        let mut test = ClusterMap::new();
        test.insert(3, BTreeMap::from([("h1".to_string(), test_entry("h1", &[500]))]));

        let mut detector = FrequencyAnomalyDetector::default();
        let scores =
            detect_frequency_anomalies(&mut detector, &control, &mut test, Direction::Both)
                .unwrap();
        assert!(scores.is_empty());
        assert!(!detector.is_fitted(3));
        assert!(detector.is_empty());
        assert!(!test[&3]["h1"].unexpected_freq);
        assert!(test[&3]["h1"].anomalous_counts.is_empty());
    }

    #[test]
    fn worst_host_freq_score_is_promoted() {
        let mut control = ClusterMap::new();
        control.insert(0, BTreeMap::from([("h1".to_string(), control_entry("h1", &[10, 10]))]));
        let mut test = ClusterMap::new();
        test.insert(
            0,
            BTreeMap::from([
                ("h1".to_string(), test_entry("h1", &[40, 10, 10, 10])),
                ("h2".to_string(), test_entry("h2", &[40, 40])),
            ]),
        );

        let mut detector = FrequencyAnomalyDetector::default();
        let scores =
            detect_frequency_anomalies(&mut detector, &control, &mut test, Direction::Higher)
                .unwrap();
        assert_eq!(test[&0]["h1"].freq_score, 0.25);
        assert_eq!(scores[&0].freq_score, 1.0);
    }
}
