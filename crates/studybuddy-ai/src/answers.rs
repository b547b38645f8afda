use crate::llm_provider::{GenerationConfig, LLMProvider};
use crate::prompts::answer_messages;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use studybuddy_core::{
    Answer, Chunk, ErrorKind, Question, Result, RetryExhausted, RetryPolicy, ScoredChunk,
    StudyBuddyConfig, StudyBuddyError, VectorStore,
};
use studybuddy_vector::EmbeddingProvider;
use tracing::{debug, info, instrument, warn};

const DEFAULT_TOP_K: usize = 4;
const DEFAULT_BATCH_SIZE: usize = 32;

/// Read-only similarity index over the fine chunks of one document.
pub struct VectorIndex {
    store: Box<dyn VectorStore>,
}

impl VectorIndex {
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.store.query(vector, k).await
    }
}

/// Builds the fine-chunk index, then answers questions against it.
pub struct AnswerRetriever {
    llm: Arc<dyn LLMProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    generation: GenerationConfig,
    retry: RetryPolicy,
    top_k: usize,
    batch_size: usize,
    concurrency: usize,
}

impl AnswerRetriever {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        generation: GenerationConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            embedder,
            generation,
            retry,
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
        }
    }

    pub fn from_config(
        llm: Arc<dyn LLMProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &StudyBuddyConfig,
    ) -> Self {
        let generation = GenerationConfig::with_temperature(
            config.llm.effective_answer_temperature(),
            config.llm.max_tokens,
        );
        Self::new(llm, embedder, generation, config.retry.clone())
            .with_top_k(config.retrieval.top_k)
            .with_batch_size(config.embedding.batch_size)
            .with_concurrency(config.pipeline.answer_concurrency)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embed every fine chunk and bulk-load `store`.
    ///
    /// Any batch that exhausts its retries fails the whole build.
    #[instrument(skip(self, chunks, store), fields(chunks = chunks.len()))]
    pub async fn build_index(
        &self,
        chunks: &[Chunk],
        mut store: Box<dyn VectorStore>,
    ) -> Result<VectorIndex> {
        if chunks.is_empty() {
            return Err(StudyBuddyError::embedding(
                "document produced no fine chunks to index",
            ));
        }

        let start = Instant::now();
        let mut vectors = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let label = format!("embedding batch {} ({} chunks)", batch_no, texts.len());

            let texts = &texts;
            let embedder = &self.embedder;
            let batch_vectors = self
                .retry
                .run(&label, || async move {
                    let batch_vectors = embedder.embed_batch(texts).await?;
                    if batch_vectors.len() != texts.len() {
                        return Err(StudyBuddyError::embedding(format!(
                            "expected {} vectors, received {}",
                            texts.len(),
                            batch_vectors.len()
                        )));
                    }
                    Ok(batch_vectors)
                })
                .await
                .map_err(|exhausted| StudyBuddyError::embedding(exhausted.to_string()))?;

            vectors.extend(batch_vectors);
        }

        store.build(chunks.to_vec(), vectors).await?;
        info!(
            "Indexed {} fine chunks with {} in {}ms",
            store.len(),
            self.embedder.provider_name(),
            start.elapsed().as_millis()
        );

        Ok(VectorIndex { store })
    }

    /// One answer per question, in question order.
    ///
    /// Exhausted retries at any step yield a placeholder answer for that question only.
    #[instrument(skip(self, questions, index), fields(questions = questions.len()))]
    pub async fn answer_all(&self, questions: &[Question], index: &VectorIndex) -> Vec<Answer> {
        let start = Instant::now();

        let answers: Vec<Answer> = stream::iter(questions)
            .map(|question| self.answer_one(question, index))
            .buffered(self.concurrency)
            .collect()
            .await;

        let answered = answers.iter().filter(|a| a.is_answered()).count();
        info!(
            "Answered {}/{} questions in {}ms",
            answered,
            answers.len(),
            start.elapsed().as_millis()
        );
        answers
    }

    /// Embed, retrieve, generate. No state carries over between questions.
    pub async fn answer_one(&self, question: &Question, index: &VectorIndex) -> Answer {
        let number = question.number;

        // Step 1: embed the question into the index's space
        let text = question.text.as_str();
        let embedder = &self.embedder;
        let label = format!("embedding question {}", number);
        let vector = match self
            .retry
            .run(&label, || async move { embedder.embed(text).await })
            .await
        {
            Ok(vector) => vector,
            Err(exhausted) => return unanswered(question, ErrorKind::Embedding, exhausted),
        };

        // Step 2: nearest fine chunks
        let vector = vector.as_slice();
        let k = self.top_k;
        let label = format!("retrieval for question {}", number);
        let supporting = match self
            .retry
            .run(&label, || async move { index.search(vector, k).await })
            .await
        {
            Ok(supporting) => supporting,
            Err(exhausted) => return unanswered(question, ErrorKind::Retrieval, exhausted),
        };
        debug!(
            "Question {} retrieved chunks {:?}",
            number,
            supporting.iter().map(|c| c.chunk.index).collect::<Vec<_>>()
        );

        // Step 3: generate strictly from the retrieved text
        let messages = answer_messages(question, &supporting);
        let messages = &messages;
        let llm = &self.llm;
        let generation = &self.generation;
        let label = format!("answer generation for question {}", number);
        let text = match self
            .retry
            .run(&label, || async move {
                let response = llm
                    .generate_chat(messages, generation)
                    .await
                    .map_err(|e| StudyBuddyError::generation(format!("{:#}", e)))?;
                let content = response.content.trim();
                if content.is_empty() {
                    return Err(StudyBuddyError::generation("empty answer"));
                }
                Ok(content.to_string())
            })
            .await
        {
            Ok(text) => text,
            Err(exhausted) => return unanswered(question, ErrorKind::Generation, exhausted),
        };

        Answer::answered(question, text, supporting)
    }
}

fn unanswered(question: &Question, stage: ErrorKind, exhausted: RetryExhausted) -> Answer {
    warn!(
        "Question {} left unanswered at {} stage after {} attempt(s): {}",
        question.number, stage, exhausted.attempts, exhausted.last_error
    );
    Answer::unanswered(
        question,
        stage,
        exhausted.last_error.to_string(),
        exhausted.attempts,
    )
}
