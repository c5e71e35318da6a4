use std::collections::{HashMap, VecDeque};

use logdiff_core::{ClusterLabel, FeatureFilter, LogDiffError, Result};

use super::projection::classical_mds;
use super::tfidf::{cosine, is_zero, TfidfVectorizer};
use crate::collaborator::{Clustering, LabeledText, MatchOutcome, TextClusterer};

/// Default similarity at which two texts are the same message shape.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Number of terms recorded per cluster.
const TAGS_PER_CLUSTER: usize = 10;

/// Similarity-threshold text clustering.
///
/// Texts are TF-IDF vectors; any two with cosine similarity at or above the
/// threshold are density-connected, and clusters are the connected
/// components (DBSCAN with `min_pts = 1` over cosine distance). Cluster ids
/// are assigned in order of first appearance, so results are stable for a
/// given input order.
#[derive(Debug, Clone)]
pub struct ThresholdClusterer {
    threshold: f64,
}

/// Control clusters captured for matching.
#[derive(Debug, Clone)]
pub struct CentroidModel {
    vectorizer: TfidfVectorizer,
    centroids: Vec<(ClusterLabel, Vec<f64>)>,
    /// Mean similarity of each cluster's members to its centroid.
    cohesion: HashMap<ClusterLabel, f64>,
    /// Member texts without features, matched by exact text instead.
    featureless: HashMap<String, ClusterLabel>,
}

impl CentroidModel {
    fn cluster_score(&self, cluster: ClusterLabel) -> f64 {
        self.cohesion.get(&cluster).copied().unwrap_or(1.0)
    }
}

impl Default for ThresholdClusterer {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl ThresholdClusterer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl TextClusterer for ThresholdClusterer {
    type Model = CentroidModel;

    fn cluster(
        &self,
        texts: &[LabeledText],
        corpus: &[LabeledText],
        filter: FeatureFilter,
    ) -> Result<Clustering<CentroidModel>> {
        let documents: Vec<&str> = corpus.iter().map(|t| t.text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&documents, filter)?;

        let vectors: Vec<Vec<f64>> = texts.iter().map(|t| vectorizer.transform(&t.text)).collect();
        let components = connected_components(&vectors, self.threshold);

        let mut assignments = HashMap::with_capacity(texts.len());
        let mut members: Vec<Vec<usize>> = Vec::new();
        for (idx, &component) in components.iter().enumerate() {
            assignments.insert(texts[idx].label, component as ClusterLabel);
            if members.len() <= component {
                members.resize_with(component + 1, Vec::new);
            }
            members[component].push(idx);
        }

        let dim = vectorizer.len();
        let mut centroids = Vec::with_capacity(members.len());
        let mut cohesion = HashMap::with_capacity(members.len());
        let mut tags = HashMap::with_capacity(members.len());
        let mut featureless = HashMap::new();

        for (component, idxs) in members.iter().enumerate() {
            let cluster = component as ClusterLabel;
            let mut centroid = vec![0.0; dim];
            for &i in idxs {
                for (c, v) in centroid.iter_mut().zip(&vectors[i]) {
                    *c += v;
                }
            }
            let count = idxs.len() as f64;
            for c in centroid.iter_mut() {
                *c /= count;
            }

            // A lone member is its own centroid, even without features.
            let mean_similarity = if idxs.len() == 1 {
                1.0
            } else {
                idxs.iter().map(|&i| cosine(&vectors[i], &centroid)).sum::<f64>() / count
            };
            cohesion.insert(cluster, mean_similarity);
            for &i in idxs.iter().filter(|&&i| is_zero(&vectors[i])) {
                featureless.entry(texts[i].text.clone()).or_insert(cluster);
            }
            tags.insert(cluster, top_terms(&centroid, vectorizer.terms(), TAGS_PER_CLUSTER));
            centroids.push((cluster, centroid));
        }

        Ok(Clustering {
            assignments,
            tags,
            model: CentroidModel {
                vectorizer,
                centroids,
                cohesion,
                featureless,
            },
        })
    }

    fn classify(
        &self,
        model: &CentroidModel,
        texts: &[LabeledText],
    ) -> Result<HashMap<ClusterLabel, MatchOutcome>> {
        let mut outcomes = HashMap::with_capacity(texts.len());
        for text in texts {
            let vector = model.vectorizer.transform(&text.text);
            if is_zero(&vector) {
                if let Some(&cluster) = model.featureless.get(&text.text) {
                    outcomes.insert(
                        text.label,
                        MatchOutcome {
                            matched: true,
                            matched_label: Some(cluster),
                            cluster_score: model.cluster_score(cluster),
                            score: 1.0,
                        },
                    );
                    continue;
                }
            }

            let mut nearest: Option<(ClusterLabel, f64)> = None;
            for (cluster, centroid) in &model.centroids {
                let similarity = cosine(&vector, centroid);
                match nearest {
                    Some((_, best)) if similarity <= best => {}
                    _ => nearest = Some((*cluster, similarity)),
                }
            }

            let outcome = match nearest {
                Some((cluster, similarity)) => MatchOutcome {
                    matched: similarity >= self.threshold,
                    matched_label: Some(cluster),
                    cluster_score: model.cluster_score(cluster),
                    score: similarity,
                },
                None => MatchOutcome {
                    matched: false,
                    matched_label: None,
                    cluster_score: 1.0,
                    score: 0.0,
                },
            };
            outcomes.insert(text.label, outcome);
        }
        Ok(outcomes)
    }

    fn distance_matrix(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let vectorizer = TfidfVectorizer::fit(texts, FeatureFilter::relaxed())?;
        let vectors: Vec<Vec<f64>> = texts.iter().map(|t| vectorizer.transform(t)).collect();
        let n = vectors.len();
        let mut distances = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = 1.0 - cosine(&vectors[i], &vectors[j]);
                distances[i][j] = d;
                distances[j][i] = d;
            }
        }
        Ok(distances)
    }

    fn project(&self, distances: &[Vec<f64>]) -> Result<Vec<(f64, f64)>> {
        if distances.iter().any(|row| row.len() != distances.len()) {
            return Err(LogDiffError::Collaborator(
                "distance matrix is not square".into(),
            ));
        }
        Ok(classical_mds(distances))
    }
}

/// Label each vector with its connected component under `similarity ≥
/// threshold`. Components are numbered in order of their first member.
fn connected_components(vectors: &[Vec<f64>], threshold: f64) -> Vec<usize> {
    let n = vectors.len();
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i && cosine(&vectors[i], &vectors[j]) >= threshold)
                .collect()
        })
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut current = 0;

    for i in 0..n {
        if labels[i].is_some() {
            continue;
        }
        labels[i] = Some(current);

        let mut queue: VecDeque<usize> = neighbors[i].iter().copied().collect();
        while let Some(j) = queue.pop_front() {
            if labels[j].is_some() {
                continue;
            }
            labels[j] = Some(current);
            queue.extend(neighbors[j].iter().copied().filter(|&k| labels[k].is_none()));
        }

        current += 1;
    }

    labels.into_iter().map(|l| l.unwrap_or(0)).collect()
}

/// Highest-weighted terms of a centroid; ties keep vocabulary order.
fn top_terms(centroid: &[f64], terms: &[String], max_terms: usize) -> Vec<String> {
    let mut ranked: Vec<(usize, f64)> = centroid
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, w)| *w > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(max_terms)
        .map(|(i, _)| terms[i].clone())
        .collect()
}
