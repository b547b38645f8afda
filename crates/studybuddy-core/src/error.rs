use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyBuddyError {
    #[error("Document load error: {0}")]
    DocumentLoad(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("External service error: {0}")]
    External(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StudyBuddyError>;

/// Failure class used when a unit (chunk or question) is reported as skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DocumentLoad,
    Generation,
    Embedding,
    Retrieval,
    Configuration,
    Timeout,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DocumentLoad => "document_load",
            ErrorKind::Generation => "generation",
            ErrorKind::Embedding => "embedding",
            ErrorKind::Retrieval => "retrieval",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl StudyBuddyError {
    pub fn document_load(msg: impl Into<String>) -> Self {
        Self::DocumentLoad(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StudyBuddyError::DocumentLoad(_) => ErrorKind::DocumentLoad,
            StudyBuddyError::Generation(_) => ErrorKind::Generation,
            StudyBuddyError::Embedding(_) => ErrorKind::Embedding,
            StudyBuddyError::Retrieval(_) => ErrorKind::Retrieval,
            StudyBuddyError::Configuration(_) => ErrorKind::Configuration,
            StudyBuddyError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Other,
        }
    }
}
