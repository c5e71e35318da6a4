use std::collections::{HashMap, HashSet};

use logdiff_core::{FeatureFilter, LogDiffError, Result};

/// TF-IDF vectorizer with document-frequency pruning.
///
/// Tokens are lowercase runs of alphanumerics (plus `_`) of length ≥ 2, so
/// status codes like `503` are features while single characters are not.
/// IDF is smoothed, `ln((1 + n) / (1 + df)) + 1`, and
/// vectors are L2-normalized.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and IDF weights from `corpus`.
    ///
    /// Fails with `EmptyVocabulary` when no term survives pruning.
    pub fn fit<S: AsRef<str>>(corpus: &[S], filter: FeatureFilter) -> Result<Self> {
        let n_docs = corpus.len();
        if n_docs == 0 {
            return Err(LogDiffError::EmptyVocabulary("empty corpus".into()));
        }

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let unique: HashSet<String> = tokenize(doc.as_ref()).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_default() += 1;
            }
        }

        let max_docs = filter.max_df * n_docs as f64;
        let mut terms: Vec<String> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= filter.min_df && (df as f64) <= max_docs)
            .map(|(term, _)| term.clone())
            .collect();

        if terms.is_empty() {
            return Err(LogDiffError::EmptyVocabulary(format!(
                "{} documents, min_df={}, max_df={}",
                n_docs, filter.min_df, filter.max_df
            )));
        }

        terms.sort();
        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let idf = terms
            .iter()
            .map(|t| {
                let df = doc_freq[t] as f64;
                ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        Ok(Self {
            vocabulary,
            terms,
            idf,
        })
    }

    /// Dense, L2-normalized TF-IDF vector. Texts without known terms map to
    /// the zero vector.
    pub fn transform(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.terms.len()];
        for token in tokenize(text) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                vector[idx] += 1.0;
            }
        }
        for (value, idf) in vector.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        normalize(&mut vector);
        vector
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Split text into lowercase word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Cosine similarity. Zero vectors are similar to nothing.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Whether a vector carries no features at all.
pub fn is_zero(vector: &[f64]) -> bool {
    vector.iter().all(|x| *x == 0.0)
}

fn normalize(vector: &mut [f64]) {
    let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_single_characters() {
        assert_eq!(
            tokenize("ERROR 500: user_id=42 failed at x 7"),
            vec!["error", "500", "user_id", "42", "failed", "at"]
        );
    }

    #[test]
    fn identical_texts_are_fully_similar() {
        let corpus = ["disk quota exceeded", "connection refused by host"];
        let vectorizer = TfidfVectorizer::fit(&corpus, FeatureFilter::relaxed()).unwrap();
        let a = vectorizer.transform("disk quota exceeded");
        let b = vectorizer.transform("disk quota exceeded");
        let c = vectorizer.transform("connection refused by host");
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-9);
        assert_eq!(cosine(&a, &c), 0.0);
    }

    #[test]
    fn max_df_prunes_ubiquitous_terms() {
        let corpus = ["request failed alpha", "request failed beta"];
        let vectorizer = TfidfVectorizer::fit(
            &corpus,
            FeatureFilter {
                min_df: 1,
                max_df: 0.95,
            },
        )
        .unwrap();
        assert_eq!(vectorizer.terms(), &["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn pruning_everything_is_an_empty_vocabulary() {
        let corpus = ["same words here"];
        let err = TfidfVectorizer::fit(&corpus, FeatureFilter::default()).unwrap_err();
        assert!(matches!(err, LogDiffError::EmptyVocabulary(_)));

        // Relaxing the filter recovers.
        let vectorizer = TfidfVectorizer::fit(&corpus, FeatureFilter::relaxed()).unwrap();
        assert_eq!(vectorizer.len(), 3);
    }

    #[test]
    fn single_character_corpus_has_no_features() {
        let corpus = ["1 2 - 3", "7 8 9"];
        let err = TfidfVectorizer::fit(&corpus, FeatureFilter::relaxed()).unwrap_err();
        assert!(matches!(err, LogDiffError::EmptyVocabulary(_)));
    }

    #[test]
    fn status_codes_are_features() {
        let corpus = ["503", "payment accepted for order"];
        let vectorizer = TfidfVectorizer::fit(&corpus, FeatureFilter::default()).unwrap();
        let v = vectorizer.transform("503");
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_terms_give_zero_vector() {
        let vectorizer = TfidfVectorizer::fit(&["alpha beta"], FeatureFilter::relaxed()).unwrap();
        let v = vectorizer.transform("gamma delta");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine(&v, &v), 0.0);
    }
}
