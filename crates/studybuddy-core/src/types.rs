use crate::{ErrorKind, Result, StudyBuddyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Raw text of one source document plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source: PathBuf,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// File name of the source, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Which of the two chunking passes produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Large chunks used to draft questions
    Coarse,
    /// Small chunks indexed for answer retrieval
    Fine,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Coarse => write!(f, "coarse"),
            Granularity::Fine => write!(f, "fine"),
        }
    }
}

/// Size policy for one chunking pass, measured in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl ChunkingConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
        }
    }

    /// Tokens the window advances between consecutive chunks.
    pub fn stride(&self) -> usize {
        self.max_tokens - self.overlap_tokens
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(StudyBuddyError::configuration(
                "chunk size must be greater than zero",
            ));
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(StudyBuddyError::configuration(format!(
                "chunk overlap ({}) must be less than chunk size ({})",
                self.overlap_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}

/// A contiguous span of document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position within its chunk set, 0-based
    pub index: usize,
    pub granularity: Granularity,
    pub text: String,
    /// Byte offset of the first character in the source document
    pub start: usize,
    /// Byte offset one past the last character in the source document
    pub end: usize,
    pub token_count: usize,
    /// Leading bytes of `text` that repeat the tail of the previous chunk
    pub overlap_with_previous: usize,
}

impl Chunk {
    /// Text that no earlier chunk in the same set has covered.
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap_with_previous..]
    }
}

/// Both chunk sets cut from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDocument {
    pub coarse: Vec<Chunk>,
    pub fine: Vec<Chunk>,
}

/// One generated question, numbered from 1 in generation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub number: usize,
    pub text: String,
}

impl Question {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number, self.text)
    }
}

/// A chunk returned by similarity search together with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    Unanswered {
        stage: ErrorKind,
        reason: String,
        attempts: u32,
    },
}

pub const UNANSWERED_PLACEHOLDER: &str = "[unanswered] no answer could be generated for this question";

/// Response to one question with the context it was conditioned on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_number: usize,
    pub question: String,
    pub text: String,
    pub status: AnswerStatus,
    pub supporting_chunks: Vec<ScoredChunk>,
}

impl Answer {
    pub fn answered(
        question: &Question,
        text: impl Into<String>,
        supporting_chunks: Vec<ScoredChunk>,
    ) -> Self {
        Self {
            question_number: question.number,
            question: question.text.clone(),
            text: text.into(),
            status: AnswerStatus::Answered,
            supporting_chunks,
        }
    }

    /// Placeholder recorded when retries for a question are exhausted.
    pub fn unanswered(
        question: &Question,
        stage: ErrorKind,
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            question_number: question.number,
            question: question.text.clone(),
            text: UNANSWERED_PLACEHOLDER.to_string(),
            status: AnswerStatus::Unanswered {
                stage,
                reason: reason.into(),
                attempts,
            },
            supporting_chunks: Vec::new(),
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self.status, AnswerStatus::Answered)
    }

    /// Indices of the fine chunks this answer was conditioned on.
    pub fn supporting_indices(&self) -> Vec<usize> {
        self.supporting_chunks.iter().map(|c| c.chunk.index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, overlap: usize) -> Chunk {
        Chunk {
            index: 0,
            granularity: Granularity::Fine,
            text: text.to_string(),
            start: 0,
            end: text.len(),
            token_count: 1,
            overlap_with_previous: overlap,
        }
    }

    #[test]
    fn test_chunking_config_validation() {
        assert!(ChunkingConfig::new(1000, 100).validate().is_ok());
        assert!(ChunkingConfig::new(0, 0).validate().is_err());
        assert!(ChunkingConfig::new(100, 100).validate().is_err());
        assert_eq!(ChunkingConfig::new(10, 3).stride(), 7);
    }

    #[test]
    fn test_fresh_text_skips_overlap() {
        let c = chunk("shared tail and new text", 12);
        assert_eq!(c.fresh_text(), "and new text");
    }

    #[test]
    fn test_question_display() {
        let q = Question::new(3, "What is entropy?");
        assert_eq!(q.to_string(), "3. What is entropy?");
    }

    #[test]
    fn test_unanswered_placeholder() {
        let q = Question::new(5, "Define variance.");
        let answer = Answer::unanswered(&q, ErrorKind::Generation, "timeout", 3);
        assert!(!answer.is_answered());
        assert_eq!(answer.question_number, 5);
        assert_eq!(answer.text, UNANSWERED_PLACEHOLDER);
        assert!(answer.supporting_chunks.is_empty());
    }

    #[test]
    fn test_document_display_name() {
        let doc = Document::new("/tmp/notes/lecture.pdf", "text");
        assert_eq!(doc.display_name(), "lecture.pdf");
        assert!(!doc.is_blank());
        assert!(Document::new("x.txt", "  \n").is_blank());
    }
}
