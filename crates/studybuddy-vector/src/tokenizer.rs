use crate::VectorError;
use regex::Regex;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;

/// Pre-tokenisation close to the byte-level BPE split used by GPT-style models.
/// Trailing whitespace is absorbed into the token before it, so the matches tile
/// the input with no gaps.
const TOKEN_PATTERN: &str =
    r"'(?:s|t|re|ve|m|ll|d)\s*|\p{L}+\s*|\p{N}{1,3}\s*|[^\s\p{L}\p{N}]+\s*|\s+";

/// Splits text into tokens, reported as byte ranges.
///
/// The returned ranges must be sorted, contiguous, start at 0 and end at
/// `text.len()`, and fall on char boundaries. An empty text has no tokens.
pub trait TokenEncoder: Send + Sync {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, VectorError>;

    fn count_tokens(&self, text: &str) -> Result<usize, VectorError> {
        Ok(self.token_spans(text)?.len())
    }

    fn name(&self) -> &str;
}

/// Turn token start offsets into ranges covering the whole text.
fn tile_from_starts(text: &str, mut starts: Vec<usize>) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }
    starts.retain(|&s| s < text.len() && text.is_char_boundary(s));
    starts.push(0);
    starts.sort_unstable();
    starts.dedup();

    let mut spans = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        spans.push(start..end);
    }
    spans
}

/// Built-in encoder; needs no model files.
pub struct RegexTokenEncoder {
    pattern: Regex,
}

impl RegexTokenEncoder {
    pub fn new() -> Result<Self, VectorError> {
        let pattern =
            Regex::new(TOKEN_PATTERN).map_err(|e| VectorError::Tokenizer(e.to_string()))?;
        Ok(Self { pattern })
    }
}

impl TokenEncoder for RegexTokenEncoder {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, VectorError> {
        let starts = self.pattern.find_iter(text).map(|m| m.start()).collect();
        Ok(tile_from_starts(text, starts))
    }

    fn name(&self) -> &str {
        "regex-bpe"
    }
}

/// Encoder backed by a HuggingFace `tokenizer.json`.
pub struct HfTokenEncoder {
    tokenizer: Tokenizer,
    name: String,
}

impl HfTokenEncoder {
    pub fn from_file(path: &Path) -> Result<Self, VectorError> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            VectorError::Tokenizer(format!(
                "failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self {
            tokenizer,
            name: format!("hf:{}", path.display()),
        })
    }
}

impl TokenEncoder for HfTokenEncoder {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, VectorError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| VectorError::Tokenizer(e.to_string()))?;
        let starts = encoding.get_offsets().iter().map(|(s, _)| *s).collect();
        Ok(tile_from_starts(text, starts))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// HF tokenizer when a path is configured, built-in encoder otherwise.
pub fn create_token_encoder(path: Option<&Path>) -> Result<Arc<dyn TokenEncoder>, VectorError> {
    match path {
        Some(path) => {
            let encoder = HfTokenEncoder::from_file(path)?;
            info!("Using tokenizer {}", encoder.name());
            Ok(Arc::new(encoder))
        }
        None => Ok(Arc::new(RegexTokenEncoder::new()?)),
    }
}
