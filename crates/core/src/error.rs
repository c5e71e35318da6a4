use thiserror::Error;

use crate::event::ClusterLabel;

#[derive(Error, Debug)]
pub enum LogDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("No usable features after pruning: {0}")]
    EmptyVocabulary(String),

    #[error("No classifier fitted for cluster {0}")]
    NotFitted(ClusterLabel),

    #[error("Empty count vector for cluster {0}")]
    EmptyCounts(ClusterLabel),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LogDiffError>;
