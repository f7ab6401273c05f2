//! Error handling for the job alert pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobAlertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Posting source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Insufficient data: {available} distinct postings/features for {requested} clusters")]
    InsufficientData { requested: usize, available: usize },

    #[error("Invalid cluster count {requested} for {postings} postings")]
    InvalidClusterCount { requested: usize, postings: usize },

    #[error("No artifacts found at {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Artifact store {} is locked by another run", .0.display())]
    ArtifactLocked(PathBuf),

    #[error("Corrupt artifact {}: {reason}", .path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("Mail delivery to {recipient} failed: {reason}")]
    MailDelivery { recipient: String, reason: String },
}

impl JobAlertError {
    /// True for a missing artifact set, which callers treat as a first run.
    pub fn is_not_found(&self) -> bool {
        matches!(self, JobAlertError::ArtifactNotFound(_))
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        JobAlertError::ArtifactCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, JobAlertError>;
