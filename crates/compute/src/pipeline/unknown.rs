use std::collections::{BTreeMap, HashMap};

use logdiff_core::{
    mean_count, ClusterLabel, ClusterMap, ControlClusterEntry, KnownClusters, LogDiffError,
    Result, UnknownClusterEntry, UnknownEvent, UnknownScore,
};
use tracing::debug;

use super::scoring::round2;
use crate::collaborator::{LabeledText, TextSimilarity};

/// Representative text of each unknown group, labelled by group index.
pub fn group_texts(anomalies: &[Vec<UnknownEvent>]) -> Vec<LabeledText> {
    anomalies
        .iter()
        .enumerate()
        .filter_map(|(idx, group)| {
            group
                .first()
                .map(|event| LabeledText::new(idx as ClusterLabel, event.text.clone()))
        })
        .collect()
}

/// Every group in its own secondary cluster, for texts with no usable
/// features.
pub fn singleton_assignments(texts: &[LabeledText]) -> HashMap<ClusterLabel, ClusterLabel> {
    texts.iter().map(|t| (t.label, t.label)).collect()
}

/// Collect unknown groups into secondary clusters keyed by
/// `assignments[group index]`, one entry per host.
///
/// Every new cluster starts at `{control_score: 1.0, test_score: 1.0}` in
/// the returned score map.
pub fn group_unknown_events(
    anomalies: &[Vec<UnknownEvent>],
    assignments: &HashMap<ClusterLabel, ClusterLabel>,
) -> Result<(
    ClusterMap<UnknownClusterEntry>,
    BTreeMap<ClusterLabel, UnknownScore>,
)> {
    let mut clusters: ClusterMap<UnknownClusterEntry> = ClusterMap::new();
    let mut scores = BTreeMap::new();

    for (idx, group) in anomalies.iter().enumerate() {
        let cluster = assignments
            .get(&(idx as ClusterLabel))
            .copied()
            .ok_or_else(|| {
                LogDiffError::Collaborator(format!("no cluster assigned to unknown group {idx}"))
            })?;
        scores.entry(cluster).or_insert_with(UnknownScore::default);
        let hosts = clusters.entry(cluster).or_default();

        for event in group {
            let entry = hosts
                .entry(event.host().to_string())
                .or_insert_with(|| UnknownClusterEntry {
                    text: event.text.clone(),
                    cluster_label: event.cluster_label,
                    message_frequencies: Vec::new(),
                    control_score: event.control_score,
                    test_score: 0.0,
                    alert_score: None,
                    diff_tags: None,
                    x: None,
                    y: None,
                    test_scores: Vec::new(),
                });
            entry
                .test_scores
                .push((event.test_score, mean_count(&event.message_frequencies)));
            entry
                .message_frequencies
                .extend(event.message_frequencies.iter().cloned());
        }
    }

    Ok((clusters, scores))
}

/// Score every unknown cluster by its most deviating host.
///
/// A host's score is the count-weighted mean of its accumulated test
/// scores. The host whose `|control_score - score|` is strictly largest
/// sets the cluster's score; ties keep the earlier host.
pub fn score_unknown_events(
    clusters: &mut ClusterMap<UnknownClusterEntry>,
    scores: &mut BTreeMap<ClusterLabel, UnknownScore>,
) {
    for (cluster, hosts) in clusters.iter_mut() {
        let mut max_deviation = 0.0;
        for entry in hosts.values_mut() {
            let score = weighted_mean(&entry.test_scores);
            let deviation = (entry.control_score - score).abs();
            if deviation > max_deviation {
                max_deviation = deviation;
                let cluster_score = scores.entry(*cluster).or_default();
                cluster_score.control_score = entry.control_score;
                cluster_score.test_score = round2(deviation);
            }
            entry.test_score = round2(entry.control_score - score);
            entry.test_scores.clear();
        }
    }
}

/// Compare each unknown entry with its baseline text. Entries whose
/// similarity falls strictly inside `band` also get a diff.
pub fn attach_alert_scores<S: TextSimilarity>(
    similarity: &S,
    clusters: &mut ClusterMap<UnknownClusterEntry>,
    control: &ClusterMap<ControlClusterEntry>,
    known: &KnownClusters,
    band: (f64, f64),
) {
    let (low, high) = band;
    let mut diffs = 0usize;

    for entry in clusters.values_mut().flat_map(|hosts| hosts.values_mut()) {
        let Some(base) = baseline_text(entry.cluster_label, control, known) else {
            continue;
        };
        let Some(score) = similarity
            .similarity(base, &[entry.text.as_str()])
            .first()
            .copied()
        else {
            continue;
        };

        entry.alert_score = Some(score);
        if low < score && score < high {
            entry.diff_tags = similarity.diff(base, &[entry.text.as_str()]).into_iter().next();
            diffs += 1;
        }
    }

    debug!(diffs, "attached alert scores");
}

/// Text to compare an unknown against: the live control cluster first,
/// then ignored clusters, then clusters with feedback.
pub fn baseline_text<'a>(
    label: ClusterLabel,
    control: &'a ClusterMap<ControlClusterEntry>,
    known: &'a KnownClusters,
) -> Option<&'a str> {
    control
        .get(&label)
        .and_then(|hosts| hosts.values().next())
        .map(|entry| entry.text.as_str())
        .or_else(|| known.ignored.get(&label).map(String::as_str))
        .or_else(|| known.feedback.get(&label).map(String::as_str))
}

/// Weighted mean of `(value, weight)` pairs. Falls back to the plain mean
/// when every weight is zero.
fn weighted_mean(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total_weight > 0.0 {
        pairs.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight
    } else {
        pairs.iter().map(|(v, _)| v).sum::<f64>() / pairs.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logdiff_core::MessageFrequency;

    fn unknown(
        text: &str,
        host: &str,
        nearest: ClusterLabel,
        test_score: f64,
        counts: &[i64],
    ) -> UnknownEvent {
        UnknownEvent {
            text: text.to_string(),
            cluster_label: nearest,
            message_frequencies: counts
                .iter()
                .map(|c| MessageFrequency {
                    count: *c,
                    time: None,
                    host: host.to_string(),
                    old_label: None,
                })
                .collect(),
            control_score: 0.8,
            test_score,
        }
    }

    /// Similarity stub returning a fixed score.
    struct FixedSimilarity(f64);

    impl TextSimilarity for FixedSimilarity {
        fn similarity(&self, _base: &str, candidates: &[&str]) -> Vec<f64> {
            vec![self.0; candidates.len()]
        }

        fn diff(&self, _base: &str, candidates: &[&str]) -> Vec<Vec<String>> {
            candidates.iter().map(|_| vec!["+changed".to_string()]).collect()
        }
    }

    fn single_entry(label: ClusterLabel) -> ClusterMap<UnknownClusterEntry> {
        let anomalies = vec![vec![unknown("db timeout on shard", "h1", label, 0.2, &[4])]];
        let (clusters, _) =
            group_unknown_events(&anomalies, &HashMap::from([(0, 0)])).unwrap();
        clusters
    }

    fn control_with(label: ClusterLabel, text: &str) -> ClusterMap<ControlClusterEntry> {
        let mut control = ClusterMap::new();
        control.entry(label).or_insert_with(BTreeMap::new).insert(
            "h1".to_string(),
            ControlClusterEntry {
                text: text.to_string(),
                cluster_label: label,
                message_frequencies: Vec::new(),
                tags: Vec::new(),
                x: None,
                y: None,
            },
        );
        control
    }

    #[test]
    fn groups_merge_into_secondary_clusters() {
        let anomalies = vec![
            vec![
                unknown("timeout a", "h1", 3, 0.2, &[4]),
                unknown("timeout a", "h2", 3, 0.4, &[2]),
            ],
            vec![unknown("timeout b", "h1", 3, 0.6, &[4, 8])],
        ];
        let assignments = HashMap::from([(0, 0), (1, 0)]);
        let (clusters, scores) = group_unknown_events(&anomalies, &assignments).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(scores[&0], UnknownScore::default());
        let h1 = &clusters[&0]["h1"];
        assert_eq!(h1.text, "timeout a");
        assert_eq!(h1.message_frequencies.len(), 3);
        assert_eq!(h1.test_scores, vec![(0.2, 4.0), (0.6, 6.0)]);
    }

    #[test]
    fn worst_host_sets_cluster_score() {
        let anomalies = vec![
            vec![
                unknown("a", "h1", 3, 0.2, &[4]),
                unknown("a", "h2", 3, 0.7, &[2]),
            ],
            vec![unknown("b", "h1", 3, 0.6, &[4, 8])],
        ];
        let assignments = HashMap::from([(0, 0), (1, 0)]);
        let (mut clusters, mut scores) = group_unknown_events(&anomalies, &assignments).unwrap();
        score_unknown_events(&mut clusters, &mut scores);

        // h1: (0.2*4 + 0.6*6) / 10 = 0.44, deviation 0.36.
        // h2: 0.7, deviation 0.1.
        let h1 = &clusters[&0]["h1"];
        assert_eq!(h1.test_score, 0.36);
        assert!(h1.test_scores.is_empty());
        assert_eq!(clusters[&0]["h2"].test_score, 0.1);
        assert_eq!(
            scores[&0],
            UnknownScore {
                control_score: 0.8,
                test_score: 0.36
            }
        );
    }

    #[test]
    fn zero_deviation_keeps_initial_score() {
        let anomalies = vec![vec![unknown("a", "h1", 3, 0.8, &[1])]];
        let (mut clusters, mut scores) =
            group_unknown_events(&anomalies, &HashMap::from([(0, 4)])).unwrap();
        score_unknown_events(&mut clusters, &mut scores);
        assert_eq!(scores[&4], UnknownScore::default());
        assert_eq!(clusters[&4]["h1"].test_score, 0.0);
    }

    #[test]
    fn zero_weights_fall_back_to_plain_mean() {
        assert!((weighted_mean(&[(0.2, 0.0), (0.4, 0.0)]) - 0.3).abs() < 1e-12);
        assert_eq!(weighted_mean(&[]), 0.0);
        assert_eq!(weighted_mean(&[(1.0, 1.0), (0.0, 3.0)]), 0.25);
    }

    #[test]
    fn missing_group_assignment_is_an_error() {
        let anomalies = vec![vec![unknown("a", "h1", 3, 0.8, &[1])]];
        assert!(group_unknown_events(&anomalies, &HashMap::new()).is_err());
    }

    #[test]
    fn singleton_assignments_keep_groups_apart() {
        let texts = vec![LabeledText::new(0, "7"), LabeledText::new(1, "-")];
        let assignments = singleton_assignments(&texts);
        assert_eq!(assignments, HashMap::from([(0, 0), (1, 1)]));
    }

    #[test]
    fn diff_only_inside_open_band() {
        let control = control_with(2, "db timeout on shard one");
        for (similarity, expect_diff) in [(0.5, false), (0.51, true), (0.89, true), (0.9, false)] {
            let mut clusters = single_entry(2);
            attach_alert_scores(
                &FixedSimilarity(similarity),
                &mut clusters,
                &control,
                &KnownClusters::default(),
                (0.5, 0.9),
            );
            let entry = &clusters[&0]["h1"];
            assert_eq!(entry.alert_score, Some(similarity));
            assert_eq!(entry.diff_tags.is_some(), expect_diff, "similarity {similarity}");
        }
    }

    #[test]
    fn no_baseline_means_no_alert_score() {
        let mut clusters = single_entry(9);
        attach_alert_scores(
            &FixedSimilarity(0.7),
            &mut clusters,
            &ClusterMap::new(),
            &KnownClusters::default(),
            (0.5, 0.9),
        );
        let entry = &clusters[&0]["h1"];
        assert_eq!(entry.alert_score, None);
        assert_eq!(entry.diff_tags, None);
    }

    #[test]
    fn baseline_prefers_control_then_ignored_then_feedback() {
        let control = control_with(1, "live");
        let known = KnownClusters {
            ignored: BTreeMap::from([(1, "ignored one".to_string()), (2, "ignored two".to_string())]),
            feedback: BTreeMap::from([(2, "feedback two".to_string()), (3, "feedback three".to_string())]),
        };
        assert_eq!(baseline_text(1, &control, &known), Some("live"));
        assert_eq!(baseline_text(2, &control, &known), Some("ignored two"));
        assert_eq!(baseline_text(3, &control, &known), Some("feedback three"));
        assert_eq!(baseline_text(4, &control, &known), None);
    }
}
