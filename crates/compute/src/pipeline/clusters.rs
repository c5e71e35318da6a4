use std::collections::HashMap;

use logdiff_core::{
    ClusterLabel, ClusterMap, ControlClusterEntry, EventMap, LogDiffError, Result,
    TestClusterEntry, UnknownEvent,
};
use tracing::debug;

use super::{is_real_label, UNKNOWN_LABEL_BASE};
use crate::collaborator::{Clustering, MatchOutcome};

/// Test events split into matched clusters and unknown groups.
#[derive(Debug, Default)]
pub struct TestLabelling {
    pub test_clusters: ClusterMap<TestClusterEntry>,
    /// One group per original test label with at least one unmatched event.
    pub anomalies: Vec<Vec<UnknownEvent>>,
}

/// Re-label control events with their cluster and collect them per
/// `(cluster, host)`.
pub fn build_control_clusters<M>(
    events: &mut EventMap,
    clustering: &Clustering<M>,
    max_tags: usize,
) -> Result<ClusterMap<ControlClusterEntry>> {
    let mut clusters = ClusterMap::new();

    for (label, events) in events.iter_mut() {
        let cluster = clustering.cluster_of(*label).ok_or_else(|| {
            LogDiffError::Collaborator(format!("no cluster assigned to control label {label}"))
        })?;

        for event in events.iter_mut() {
            event.cluster_label = cluster;
            let entry = clusters
                .entry(cluster)
                .or_insert_with(Default::default)
                .entry(event.host().to_string())
                .or_insert_with(|| ControlClusterEntry {
                    text: event.text.clone(),
                    cluster_label: cluster,
                    message_frequencies: Vec::new(),
                    tags: clustering.tags_for(cluster, max_tags),
                    x: None,
                    y: None,
                });
            entry
                .message_frequencies
                .extend(event.message_frequencies.iter().cloned());
        }
    }

    debug!(clusters = clusters.len(), "built control clusters");
    Ok(clusters)
}

/// Annotate test events with their match scores and split them into
/// matched clusters and unknown groups.
///
/// Matched events take the matched control label. Every unmatched event
/// gets its own synthetic label counting up from [`UNKNOWN_LABEL_BASE`],
/// and joins the unknown group of its original label. The group entry
/// remembers the nearest control cluster so a baseline can be found later.
pub fn build_test_clusters<M>(
    events: &mut EventMap,
    outcomes: &HashMap<ClusterLabel, MatchOutcome>,
    clustering: &Clustering<M>,
    max_tags: usize,
) -> Result<TestLabelling> {
    let mut labelling = TestLabelling::default();
    let mut next_unknown = UNKNOWN_LABEL_BASE;

    for (label, events) in events.iter_mut() {
        let outcome = outcomes.get(label).copied().ok_or_else(|| {
            LogDiffError::Collaborator(format!("no match outcome for test label {label}"))
        })?;
        let matched = outcome
            .matched_label
            .filter(|cluster| outcome.matched && is_real_label(*cluster));

        let mut group = Vec::new();
        for event in events.iter_mut() {
            event.control_score = Some(outcome.cluster_score);
            event.test_score = Some(outcome.score);

            match matched {
                Some(cluster) => {
                    event.cluster_label = cluster;
                    let entry = labelling
                        .test_clusters
                        .entry(cluster)
                        .or_insert_with(Default::default)
                        .entry(event.host().to_string())
                        .or_insert_with(|| TestClusterEntry {
                            text: event.text.clone(),
                            cluster_label: cluster,
                            message_frequencies: Vec::new(),
                            anomalous_counts: Vec::new(),
                            unexpected_freq: false,
                            control_score: outcome.cluster_score,
                            test_score: outcome.score,
                            freq_score: 0.0,
                            tags: clustering.tags_for(cluster, max_tags),
                            x: None,
                            y: None,
                        });
                    entry
                        .message_frequencies
                        .extend(event.message_frequencies.iter().cloned());
                }
                None => {
                    event.cluster_label = next_unknown;
                    next_unknown += 1;
                    group.push(UnknownEvent {
                        text: event.text.clone(),
                        cluster_label: outcome.matched_label.unwrap_or(event.cluster_label),
                        message_frequencies: event.message_frequencies.clone(),
                        control_score: outcome.cluster_score,
                        test_score: outcome.score,
                    });
                }
            }
        }

        if !group.is_empty() {
            labelling.anomalies.push(group);
        }
    }

    debug!(
        test_clusters = labelling.test_clusters.len(),
        unknown_groups = labelling.anomalies.len(),
        synthetic_labels = next_unknown - UNKNOWN_LABEL_BASE,
        "built test clusters"
    );
    Ok(labelling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logdiff_core::Event;

    fn clustering(pairs: &[(ClusterLabel, ClusterLabel)]) -> Clustering<()> {
        Clustering {
            assignments: pairs.iter().copied().collect(),
            tags: HashMap::from([(0, vec!["disk".to_string(), "full".to_string()])]),
            model: (),
        }
    }

    fn event_map(items: &[(ClusterLabel, &str, &str, i64)]) -> EventMap {
        let mut map = EventMap::new();
        for (label, text, host, count) in items {
            map.entry(*label)
                .or_default()
                .push(Event::new(*label, *text).with_frequency(*count, None, host));
        }
        map
    }

    fn outcome(matched: bool, label: Option<ClusterLabel>, score: f64) -> MatchOutcome {
        MatchOutcome {
            matched,
            matched_label: label,
            cluster_score: 0.9,
            score,
        }
    }

    #[test]
    fn control_events_merge_per_host() {
        let mut events = event_map(&[
            (7, "disk full", "h1", 3),
            (7, "disk full", "h1", 4),
            (7, "disk full", "h2", 5),
            (8, "disk nearly full", "h1", 1),
        ]);
        let clusters =
            build_control_clusters(&mut events, &clustering(&[(7, 0), (8, 0)]), 1).unwrap();

        assert_eq!(clusters.len(), 1);
        let h1 = &clusters[&0]["h1"];
        assert_eq!(h1.message_frequencies.len(), 3);
        assert_eq!(h1.text, "disk full");
        assert_eq!(h1.tags, vec!["disk"]);
        assert_eq!(clusters[&0]["h2"].message_frequencies.len(), 1);
        assert!(events.values().flatten().all(|e| e.cluster_label == 0));
    }

    #[test]
    fn missing_assignment_is_an_error() {
        let mut events = event_map(&[(7, "disk full", "h1", 3)]);
        let err = build_control_clusters(&mut events, &clustering(&[]), 5).unwrap_err();
        assert!(matches!(err, LogDiffError::Collaborator(_)));
    }

    #[test]
    fn synthetic_labels_increase_from_base() {
        let mut events = event_map(&[
            (1, "disk full", "h1", 3),
            (2, "novel one", "h1", 1),
            (2, "novel one", "h2", 1),
            (3, "novel two", "h1", 2),
        ]);
        let outcomes = HashMap::from([
            (1, outcome(true, Some(0), 0.95)),
            (2, outcome(false, Some(0), 0.1)),
            (3, outcome(false, None, 0.0)),
        ]);
        let labelling =
            build_test_clusters(&mut events, &outcomes, &clustering(&[]), 5).unwrap();

        let synthetic: Vec<ClusterLabel> = events
            .values()
            .flatten()
            .map(|e| e.cluster_label)
            .filter(|l| !is_real_label(*l))
            .collect();
        assert_eq!(synthetic, vec![1_000_000, 1_000_001, 1_000_002]);

        assert_eq!(labelling.test_clusters.len(), 1);
        assert_eq!(labelling.test_clusters[&0]["h1"].test_score, 0.95);
        assert_eq!(labelling.anomalies.len(), 2);
        assert_eq!(labelling.anomalies[0].len(), 2);
        // Nearest control cluster is kept for baseline lookups.
        assert_eq!(labelling.anomalies[0][0].cluster_label, 0);
        // Without a nearest cluster the synthetic label stands in.
        assert_eq!(labelling.anomalies[1][0].cluster_label, 1_000_002);

        let annotated = &events[&2][0];
        assert_eq!(annotated.control_score, Some(0.9));
        assert_eq!(annotated.test_score, Some(0.1));
    }

    #[test]
    fn match_onto_synthetic_range_counts_as_unknown() {
        let mut events = event_map(&[(1, "odd", "h1", 1)]);
        let outcomes = HashMap::from([(1, outcome(true, Some(UNKNOWN_LABEL_BASE + 5), 0.99))]);
        let labelling =
            build_test_clusters(&mut events, &outcomes, &clustering(&[]), 5).unwrap();
        assert!(labelling.test_clusters.is_empty());
        assert_eq!(labelling.anomalies.len(), 1);
    }

    #[test]
    fn missing_outcome_is_an_error() {
        let mut events = event_map(&[(1, "odd", "h1", 1)]);
        let err = build_test_clusters(&mut events, &HashMap::new(), &clustering(&[]), 5)
            .unwrap_err();
        assert!(matches!(err, LogDiffError::Collaborator(_)));
    }
}
