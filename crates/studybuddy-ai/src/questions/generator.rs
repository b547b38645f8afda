use super::dedup::{dedup_policy_for, refine_questions, DedupPolicy, Normalized};
use super::parse::QuestionParser;
use crate::llm_provider::{GenerationConfig, LLMProvider, Message};
use crate::prompts::{question_messages, refine_messages};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use studybuddy_core::{
    Chunk, Question, QuestionStrategy, Result, RetryExhausted, RetryPolicy, SkippedChunk,
    StudyBuddyConfig, StudyBuddyError,
};
use tracing::{debug, info, instrument, warn};

/// Questions drafted from a chunk sequence plus the chunks that had to be skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionSet {
    /// Numbered 1..N with no gaps
    pub questions: Vec<Question>,
    pub skipped: Vec<SkippedChunk>,
}

impl QuestionSet {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

pub struct QuestionGenerator {
    llm: Arc<dyn LLMProvider>,
    generation: GenerationConfig,
    retry: RetryPolicy,
    strategy: QuestionStrategy,
    dedup: Box<dyn DedupPolicy>,
    concurrency: usize,
    parser: QuestionParser,
}

impl QuestionGenerator {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        generation: GenerationConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            llm,
            generation,
            retry,
            strategy: QuestionStrategy::PerChunk,
            dedup: Box::new(Normalized),
            concurrency: 1,
            parser: QuestionParser::new()?,
        })
    }

    pub fn from_config(llm: Arc<dyn LLMProvider>, config: &StudyBuddyConfig) -> Result<Self> {
        let generation = GenerationConfig::with_temperature(
            config.llm.effective_question_temperature(),
            config.llm.max_tokens,
        );
        Ok(Self::new(llm, generation, config.retry.clone())?
            .with_strategy(config.pipeline.question_strategy)
            .with_dedup(dedup_policy_for(config.pipeline.dedup))
            .with_concurrency(config.pipeline.question_concurrency))
    }

    pub fn with_strategy(mut self, strategy: QuestionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_dedup(mut self, dedup: Box<dyn DedupPolicy>) -> Self {
        self.dedup = dedup;
        self
    }

    /// In-flight requests for `PerChunk`; `Refine` is always sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn strategy(&self) -> QuestionStrategy {
        self.strategy
    }

    /// Draft questions for every coarse chunk.
    ///
    /// A chunk whose request keeps failing is recorded in `skipped` and the
    /// remaining chunks are still processed.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len(), strategy = ?self.strategy))]
    pub async fn generate(&self, chunks: &[Chunk]) -> QuestionSet {
        let start = Instant::now();

        let (drafted, skipped) = match self.strategy {
            QuestionStrategy::PerChunk => self.generate_per_chunk(chunks).await,
            QuestionStrategy::Refine => self.generate_refined(chunks).await,
        };

        let questions = refine_questions(&drafted, self.dedup.as_ref());
        info!(
            "Generated {} questions ({} drafted, {} merged by {} dedup) in {}ms; {} chunk(s) skipped",
            questions.len(),
            drafted.len(),
            drafted.len() - questions.len(),
            self.dedup.name(),
            start.elapsed().as_millis(),
            skipped.len()
        );

        QuestionSet { questions, skipped }
    }

    async fn generate_per_chunk(&self, chunks: &[Chunk]) -> (Vec<Question>, Vec<SkippedChunk>) {
        // `buffered` yields in chunk order regardless of completion order
        let outcomes: Vec<_> = stream::iter(chunks)
            .map(|chunk| async move {
                let label = format!("question generation for chunk {}", chunk.index);
                let outcome = self
                    .request_questions(&label, question_messages(&chunk.text))
                    .await;
                (chunk.index, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut drafted = Vec::new();
        let mut skipped = Vec::new();
        for (chunk_index, outcome) in outcomes {
            match outcome {
                Ok(texts) => {
                    debug!("Chunk {} produced {} question(s)", chunk_index, texts.len());
                    drafted.extend(texts);
                }
                Err(exhausted) => skipped.push(skipped_chunk(chunk_index, exhausted)),
            }
        }

        (number(drafted), skipped)
    }

    /// Each chunk revises the running list; the first successful chunk drafts it.
    async fn generate_refined(&self, chunks: &[Chunk]) -> (Vec<Question>, Vec<SkippedChunk>) {
        let mut running: Vec<Question> = Vec::new();
        let mut skipped = Vec::new();

        for chunk in chunks {
            let messages = if running.is_empty() {
                question_messages(&chunk.text)
            } else {
                refine_messages(&running, &chunk.text)
            };
            let label = format!("question refinement for chunk {}", chunk.index);

            match self.request_questions(&label, messages).await {
                Ok(texts) => {
                    debug!(
                        "Chunk {} revised the list from {} to {} question(s)",
                        chunk.index,
                        running.len(),
                        texts.len()
                    );
                    running = number(texts);
                }
                Err(exhausted) => skipped.push(skipped_chunk(chunk.index, exhausted)),
            }
        }

        (running, skipped)
    }

    async fn request_questions(
        &self,
        label: &str,
        messages: Vec<Message>,
    ) -> std::result::Result<Vec<String>, RetryExhausted> {
        let messages = &messages;
        self.retry
            .run(label, || async move { self.draft(messages).await })
            .await
    }

    /// One attempt: call the model and parse its reply.
    async fn draft(&self, messages: &[Message]) -> Result<Vec<String>> {
        let response = self
            .llm
            .generate_chat(messages, &self.generation)
            .await
            .map_err(|e| StudyBuddyError::generation(format!("{:#}", e)))?;

        let texts = self.parser.parse(&response.content);
        if texts.is_empty() {
            return Err(StudyBuddyError::generation(format!(
                "{} response contained no questions",
                self.llm.provider_name()
            )));
        }
        Ok(texts)
    }
}

fn number(texts: Vec<String>) -> Vec<Question> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Question::new(i + 1, text))
        .collect()
}

fn skipped_chunk(chunk_index: usize, exhausted: RetryExhausted) -> SkippedChunk {
    warn!(
        "Skipping chunk {} after {} attempt(s): {}",
        chunk_index, exhausted.attempts, exhausted.last_error
    );
    SkippedChunk {
        chunk_index,
        attempts: exhausted.attempts,
        kind: exhausted.last_error.kind(),
        error: exhausted.last_error.to_string(),
    }
}
