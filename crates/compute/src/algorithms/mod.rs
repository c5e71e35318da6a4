//! Default text collaborators.
//!
//! - [`threshold`]: similarity-threshold clustering over TF-IDF vectors
//! - [`ngram`]: character n-gram similarity and token diff
//! - [`tfidf`]: the shared vectorizer
//! - [`projection`]: 2-D layout from a distance matrix

pub mod ngram;
pub mod projection;
pub mod tfidf;
pub mod threshold;

pub use ngram::NgramSimilarity;
pub use tfidf::TfidfVectorizer;
pub use threshold::{CentroidModel, ThresholdClusterer};
