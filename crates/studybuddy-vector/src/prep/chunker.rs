use crate::tokenizer::TokenEncoder;
use std::sync::Arc;
use std::time::Instant;
use studybuddy_core::{Chunk, ChunkingConfig, Document, Granularity, Result, SplitDocument};

/// Sliding token window over a text.
pub struct TokenTextSplitter {
    encoder: Arc<dyn TokenEncoder>,
}

impl TokenTextSplitter {
    pub fn new(encoder: Arc<dyn TokenEncoder>) -> Self {
        Self { encoder }
    }

    /// Cut `text` into windows of at most `max_tokens` tokens that advance by
    /// `max_tokens - overlap_tokens`. The last window always ends on the last token.
    pub fn split(
        &self,
        text: &str,
        config: &ChunkingConfig,
        granularity: Granularity,
    ) -> Result<Vec<Chunk>> {
        config.validate()?;
        let spans = self.encoder.token_spans(text)?;
        let total = spans.len();
        let stride = config.stride();

        let mut chunks = Vec::with_capacity(total.div_ceil(stride).max(1));
        let mut first_token = 0;
        let mut previous_end: usize = 0;

        while first_token < total {
            let last_token = (first_token + config.max_tokens).min(total);
            let start = spans[first_token].start;
            let end = spans[last_token - 1].end;
            let overlap = if chunks.is_empty() {
                0
            } else {
                previous_end.saturating_sub(start)
            };

            chunks.push(Chunk {
                index: chunks.len(),
                granularity,
                text: text[start..end].to_string(),
                start,
                end,
                token_count: last_token - first_token,
                overlap_with_previous: overlap,
            });

            if last_token == total {
                break;
            }
            previous_end = end;
            first_token += stride;
        }

        Ok(chunks)
    }
}

/// Produces the coarse and fine chunk sets for one document.
pub struct DocumentSplitter {
    splitter: TokenTextSplitter,
    coarse: ChunkingConfig,
    fine: ChunkingConfig,
}

impl DocumentSplitter {
    pub fn new(
        encoder: Arc<dyn TokenEncoder>,
        coarse: ChunkingConfig,
        fine: ChunkingConfig,
    ) -> Self {
        Self {
            splitter: TokenTextSplitter::new(encoder),
            coarse,
            fine,
        }
    }

    /// Both passes read the full document text, so either set reconstructs it.
    pub fn split(&self, document: &Document) -> Result<SplitDocument> {
        let started = Instant::now();
        let coarse = self
            .splitter
            .split(&document.text, &self.coarse, Granularity::Coarse)?;
        let fine = self
            .splitter
            .split(&document.text, &self.fine, Granularity::Fine)?;

        tracing::debug!(
            "Split {} in {:?}: {} coarse / {} fine chunks",
            document.display_name(),
            started.elapsed(),
            coarse.len(),
            fine.len()
        );

        Ok(SplitDocument { coarse, fine })
    }

    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.splitter.encoder.count_tokens(text)?)
    }

    pub fn coarse_config(&self) -> &ChunkingConfig {
        &self.coarse
    }

    pub fn fine_config(&self) -> &ChunkingConfig {
        &self.fine
    }
}

/// Concatenate chunks while dropping each one's repeated prefix.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.fresh_text()).collect()
}
