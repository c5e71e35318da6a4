pub mod algorithms;
pub mod collaborator;
pub mod frequency;
pub mod loader;
pub mod pipeline;
pub mod store;

pub use algorithms::{NgramSimilarity, ThresholdClusterer};
pub use collaborator::{Clustering, LabeledText, MatchOutcome, TextClusterer, TextSimilarity};
pub use frequency::{FrequencyAnomalyDetector, FrequencyClassifier, Prediction};
pub use loader::MinuteWindow;
pub use pipeline::{
    global_score, is_real_label, DiffClustering, RunStatus, SkipReason, UNKNOWN_LABEL_BASE,
};
pub use store::{EventStore, PREV_RUN_LABEL_OFFSET};
