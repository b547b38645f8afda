#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use studybuddy_ai::{
    GenerationConfig, LLMProvider, LLMResponse, LLMResult, Message, StoreFactory, StudyPipeline,
};
use studybuddy_core::{
    Chunk, Result, RetryPolicy, ScoredChunk, StudyBuddyConfig, StudyBuddyError, VectorStore,
};
use studybuddy_vector::{EmbeddingProvider, FileDocumentLoader, InMemoryVectorStore};

pub const DIMENSION: usize = 32;

/// Bag-of-words vector: each word bumps one hashed bucket.
pub struct HashingEmbedder {
    pub calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % (DIMENSION as u64 - 1)) as usize
}

fn hashed_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        vector[bucket(&word.to_lowercase())] += 1.0;
    }
    vector[DIMENSION - 1] = 0.1;
    vector
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hashed_vector(text))
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Every call fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(StudyBuddyError::embedding("embedding service unavailable"))
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }

    fn provider_name(&self) -> &str {
        "failing"
    }

    async fn is_available(&self) -> bool {
        false
    }
}

/// Batches (the index build) succeed; single embeds containing `fragment` fail.
pub struct QuestionFailingEmbedder {
    pub fragment: String,
    pub failed_calls: AtomicUsize,
}

impl QuestionFailingEmbedder {
    pub fn new(fragment: &str) -> Arc<Self> {
        Arc::new(Self {
            fragment: fragment.to_string(),
            failed_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for QuestionFailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(&self.fragment) {
            self.failed_calls.fetch_add(1, Ordering::SeqCst);
            return Err(StudyBuddyError::embedding("question embedding rejected"));
        }
        Ok(hashed_vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hashed_vector(t)).collect())
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }

    fn provider_name(&self) -> &str {
        "question-failing"
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Builds like the in-memory store, but every query fails.
pub struct UnqueryableStore {
    inner: InMemoryVectorStore,
    pub queries: Arc<AtomicUsize>,
}

impl UnqueryableStore {
    pub fn new(queries: Arc<AtomicUsize>) -> Self {
        Self {
            inner: InMemoryVectorStore::new(),
            queries,
        }
    }
}

#[async_trait]
impl VectorStore for UnqueryableStore {
    async fn build(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        self.inner.build(chunks, vectors).await
    }

    async fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredChunk>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Err(StudyBuddyError::retrieval("index shard offline"))
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

pub fn question_text(n: usize) -> String {
    format!("What is key concept {} in the study notes?", n)
}

/// Replies to question prompts with a fixed numbered list and to answer
/// prompts with an echo of the question.
pub struct ScriptedLLM {
    pub question_count: usize,
    /// Answer prompts whose question contains one of these always fail
    pub failing_questions: Vec<String>,
    /// Question prompts containing one of these always fail
    pub failing_chunks: Vec<String>,
    /// Later questions answer faster, so completion order is reversed
    pub reverse_latency: bool,
    pub question_calls: AtomicUsize,
    pub answer_calls: AtomicUsize,
}

impl ScriptedLLM {
    pub fn new(question_count: usize) -> Self {
        Self {
            question_count,
            failing_questions: Vec::new(),
            failing_chunks: Vec::new(),
            reverse_latency: false,
            question_calls: AtomicUsize::new(0),
            answer_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_question(mut self, fragment: &str) -> Self {
        self.failing_questions.push(fragment.to_string());
        self
    }

    pub fn failing_chunk(mut self, fragment: &str) -> Self {
        self.failing_chunks.push(fragment.to_string());
        self
    }

    pub fn with_reverse_latency(mut self) -> Self {
        self.reverse_latency = true;
        self
    }

    fn reply(content: String) -> LLMResponse {
        LLMResponse {
            content,
            total_tokens: None,
            prompt_tokens: None,
            completion_tokens: None,
            finish_reason: Some("stop".to_string()),
            model: "scripted".to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedLLM {
    async fn generate_chat(
        &self,
        messages: &[Message],
        _config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if let Some(question_line) = prompt.lines().find(|l| l.starts_with("Question: ")) {
            self.answer_calls.fetch_add(1, Ordering::SeqCst);
            let question = question_line.trim_start_matches("Question: ").to_string();

            if self.reverse_latency {
                let n: u64 = question
                    .split_whitespace()
                    .find_map(|w| w.parse().ok())
                    .unwrap_or(0);
                let delay = 20u64.saturating_mul(20u64.saturating_sub(n));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            if self.failing_questions.iter().any(|f| question.contains(f)) {
                return Err(anyhow!("scripted failure for {}", question));
            }
            return Ok(Self::reply(format!("Answer to: {}", question)));
        }

        self.question_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_chunks.iter().any(|f| prompt.contains(f)) {
            return Err(anyhow!("scripted chunk failure"));
        }
        let list = (1..=self.question_count)
            .map(|n| format!("{}. {}", n, question_text(n)))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Self::reply(list))
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

const TOPICS: [&str; 6] = [
    "Cells are the basic unit of life and contain organelles such as mitochondria",
    "Energy flows through ecosystems from producers to consumers and decomposers",
    "Genes are sequences of DNA that encode the instructions for building proteins",
    "Water moves across membranes by osmosis from low to high solute concentration",
    "Enzymes lower the activation energy of reactions without being consumed",
    "Photosynthesis converts light energy into chemical energy stored in glucose",
];

/// Roughly three pages of study notes.
pub fn study_notes() -> String {
    let mut paragraphs = Vec::new();
    for p in 0..12 {
        let sentences: Vec<String> = (0..16)
            .map(|s| format!("{} (note {}.{}).", TOPICS[(p + s) % TOPICS.len()], p, s))
            .collect();
        paragraphs.push(sentences.join(" "));
    }
    paragraphs.join("\n\n")
}

pub fn write_document(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

pub fn test_config() -> StudyBuddyConfig {
    let mut config = StudyBuddyConfig::default();
    config.retry = RetryPolicy::no_backoff(2);
    config
}

pub fn pipeline(
    config: &StudyBuddyConfig,
    llm: Arc<dyn LLMProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> StudyPipeline {
    pipeline_with_store(
        config,
        llm,
        embedder,
        Arc::new(|| Box::new(InMemoryVectorStore::new()) as Box<dyn VectorStore>),
    )
}

pub fn pipeline_with_store(
    config: &StudyBuddyConfig,
    llm: Arc<dyn LLMProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    store_factory: StoreFactory,
) -> StudyPipeline {
    StudyPipeline::new(
        config,
        Arc::new(FileDocumentLoader::new()),
        llm,
        embedder,
        store_factory,
    )
    .unwrap()
}
