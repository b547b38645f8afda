use studybuddy_core::StudyBuddyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {0}, got {1}")]
    DimensionMismatch(usize, usize),

    #[error("Batch size mismatch: {0} chunks, {1} vectors")]
    BatchSizeMismatch(usize, usize),

    #[error("Vector is empty")]
    EmptyVector,

    #[error("Index has already been built")]
    AlreadyBuilt,

    #[error("Index has not been built")]
    NotBuilt,

    #[error("Index backend error: {0}")]
    Backend(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Embedding error: {0}")]
    Embedding(String),
}

impl From<VectorError> for StudyBuddyError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::Tokenizer(_) => StudyBuddyError::Configuration(err.to_string()),
            VectorError::Embedding(_) => StudyBuddyError::Embedding(err.to_string()),
            _ => StudyBuddyError::Retrieval(err.to_string()),
        }
    }
}
