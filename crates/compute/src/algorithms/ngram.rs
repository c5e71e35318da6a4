use std::collections::HashSet;

use super::tfidf::tokenize;
use crate::collaborator::TextSimilarity;

/// Character n-gram overlap similarity with a token-level diff.
#[derive(Debug, Clone)]
pub struct NgramSimilarity {
    n: usize,
}

impl Default for NgramSimilarity {
    fn default() -> Self {
        Self { n: 3 }
    }
}

impl NgramSimilarity {
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1) }
    }

    fn grams(&self, text: &str) -> HashSet<String> {
        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let chars: Vec<char> = normalized.chars().collect();
        if chars.is_empty() {
            return HashSet::new();
        }
        if chars.len() <= self.n {
            return HashSet::from([normalized]);
        }
        chars
            .windows(self.n)
            .map(|w| w.iter().collect())
            .collect()
    }

    /// Jaccard overlap of the two texts' n-gram sets.
    pub fn jaccard(&self, a: &str, b: &str) -> f64 {
        let left = self.grams(a);
        let right = self.grams(b);
        if left.is_empty() && right.is_empty() {
            return 1.0;
        }
        let shared = left.intersection(&right).count();
        let union = left.len() + right.len() - shared;
        shared as f64 / union as f64
    }
}

impl TextSimilarity for NgramSimilarity {
    fn similarity(&self, base: &str, candidates: &[&str]) -> Vec<f64> {
        candidates.iter().map(|c| self.jaccard(base, c)).collect()
    }

    /// `+term` for terms only in the candidate, `-term` for terms only in
    /// the base.
    fn diff(&self, base: &str, candidates: &[&str]) -> Vec<Vec<String>> {
        let base_tokens = tokenize(base);
        let base_set: HashSet<&str> = base_tokens.iter().map(String::as_str).collect();

        candidates
            .iter()
            .map(|candidate| {
                let tokens = tokenize(candidate);
                let set: HashSet<&str> = tokens.iter().map(String::as_str).collect();

                let mut seen = HashSet::new();
                let mut terms = Vec::new();
                for token in &tokens {
                    if !base_set.contains(token.as_str()) && seen.insert(format!("+{token}")) {
                        terms.push(format!("+{token}"));
                    }
                }
                for token in &base_tokens {
                    if !set.contains(token.as_str()) && seen.insert(format!("-{token}")) {
                        terms.push(format!("-{token}"));
                    }
                }
                terms
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_score_one() {
        let sim = NgramSimilarity::default();
        assert_eq!(sim.similarity("disk full", &["Disk   full"]), vec![1.0]);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        let sim = NgramSimilarity::default();
        assert_eq!(sim.similarity("aaaa", &["zzzz"]), vec![0.0]);
    }

    #[test]
    fn partial_overlap_is_between() {
        let sim = NgramSimilarity::default();
        let scores = sim.similarity(
            "connection timeout to payments",
            &["connection timeout to billing", "totally unrelated"],
        );
        assert!(scores[0] > 0.3 && scores[0] < 0.9);
        assert!(scores[1] < scores[0]);
    }

    #[test]
    fn short_texts_compare_whole() {
        let sim = NgramSimilarity::default();
        assert_eq!(sim.jaccard("ab", "ab"), 1.0);
        assert_eq!(sim.jaccard("ab", "abc"), 0.0);
        assert_eq!(sim.jaccard("", ""), 1.0);
    }

    #[test]
    fn diff_lists_added_then_removed_terms() {
        let sim = NgramSimilarity::default();
        let diff = sim.diff(
            "user login failed for admin",
            &["user login failed for guest guest", "user login failed for admin"],
        );
        assert_eq!(diff[0], vec!["+guest", "-admin"]);
        assert!(diff[1].is_empty());
    }
}
