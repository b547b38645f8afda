use crate::answers::AnswerRetriever;
use crate::llm_factory::LLMProviderFactory;
use crate::llm_provider::LLMProvider;
use crate::questions::QuestionGenerator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studybuddy_core::{
    AnswerStatus, Document, DocumentLoader, OutputSink, Question, Result, RunOutput, RunReport,
    SplitDocument, StudyBuddyConfig, StudyBuddyError, UnansweredQuestion, VectorStore,
};
use studybuddy_vector::{
    create_token_encoder, create_vector_store, DocumentSplitter, EmbeddingProvider,
    EmbeddingProviderFactory, FileDocumentLoader, VECTOR_STORE_BACKEND,
};
use tracing::{info, instrument, warn};

/// Produces a fresh, empty store for each run.
pub type StoreFactory = Arc<dyn Fn() -> Box<dyn VectorStore> + Send + Sync>;

pub type ProgressCallback = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Stage boundaries reported while a run is in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    DocumentLoaded { source: PathBuf, bytes: usize },
    DocumentSplit { coarse: usize, fine: usize },
    QuestionsGenerated { count: usize, skipped_chunks: usize },
    IndexBuilt { chunks: usize },
    QuestionLimitApplied { limit: usize, total: usize },
    Answering { count: usize },
    Finished { answered: usize, unanswered: usize },
}

/// Loading and both splitting passes. Needs no model credentials.
pub struct DocumentPreparer {
    loader: Arc<dyn DocumentLoader>,
    splitter: DocumentSplitter,
}

impl DocumentPreparer {
    pub fn new(config: &StudyBuddyConfig, loader: Arc<dyn DocumentLoader>) -> Result<Self> {
        let coarse = config.chunking.coarse();
        let fine = config.chunking.fine();
        coarse.validate()?;
        fine.validate()?;

        let encoder = create_token_encoder(config.chunking.tokenizer_path.as_deref())?;
        Ok(Self {
            loader,
            splitter: DocumentSplitter::new(encoder, coarse, fine),
        })
    }

    pub fn from_config(config: &StudyBuddyConfig) -> Result<Self> {
        Self::new(config, Arc::new(FileDocumentLoader::new()))
    }

    pub fn splitter(&self) -> &DocumentSplitter {
        &self.splitter
    }

    pub async fn load(&self, path: &Path) -> Result<Document> {
        let loader = self.loader.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || loader.load(&owned))
            .await
            .map_err(|e| StudyBuddyError::document_load(format!("loader task failed: {}", e)))?
    }

    pub fn split(&self, document: &Document) -> Result<SplitDocument> {
        self.splitter.split(document)
    }
}

/// Split, draft questions, index, answer. Each stage finishes before the next starts.
pub struct StudyPipeline {
    preparer: DocumentPreparer,
    questions: QuestionGenerator,
    answers: AnswerRetriever,
    llm: Arc<dyn LLMProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    store_factory: StoreFactory,
    question_limit: Option<usize>,
    progress: Option<ProgressCallback>,
}

impl StudyPipeline {
    pub fn new(
        config: &StudyBuddyConfig,
        loader: Arc<dyn DocumentLoader>,
        llm: Arc<dyn LLMProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store_factory: StoreFactory,
    ) -> Result<Self> {
        Ok(Self {
            preparer: DocumentPreparer::new(config, loader)?,
            questions: QuestionGenerator::from_config(llm.clone(), config)?,
            answers: AnswerRetriever::from_config(llm.clone(), embedder.clone(), config),
            llm,
            embedder,
            store_factory,
            question_limit: config.retrieval.question_limit,
            progress: None,
        })
    }

    /// Wire the configured providers, the file loader and the default vector store.
    pub fn from_config(config: &StudyBuddyConfig) -> Result<Self> {
        let llm = LLMProviderFactory::create_from_config(&config.llm)
            .map_err(|e| StudyBuddyError::configuration(format!("{:#}", e)))?;
        let embedder = EmbeddingProviderFactory::create_from_config(&config.embedding)?;
        info!(
            "LLM provider: {} ({}), vector store: {}",
            llm.provider_name(),
            llm.model_name(),
            VECTOR_STORE_BACKEND
        );

        Self::new(
            config,
            Arc::new(FileDocumentLoader::new()),
            llm,
            embedder,
            Arc::new(create_vector_store),
        )
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Names of the configured providers that do not answer a reachability check.
    pub async fn unavailable_providers(&self) -> Vec<String> {
        let (llm_ok, embedder_ok) =
            tokio::join!(self.llm.is_available(), self.embedder.is_available());

        let mut unavailable = Vec::new();
        if !llm_ok {
            unavailable.push(format!("LLM provider {}", self.llm.provider_name()));
        }
        if !embedder_ok {
            unavailable.push(format!(
                "embedding provider {}",
                self.embedder.provider_name()
            ));
        }
        for name in &unavailable {
            warn!("{} is not reachable", name);
        }
        unavailable
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(callback) = &self.progress {
            callback(&event);
        }
    }

    async fn load(&self, path: &Path) -> Result<Document> {
        let document = self.preparer.load(path).await?;
        self.emit(PipelineEvent::DocumentLoaded {
            source: document.source.clone(),
            bytes: document.text.len(),
        });
        Ok(document)
    }

    /// Load and split without calling any model.
    pub async fn split_only(&self, path: &Path) -> Result<SplitDocument> {
        let document = self.load(path).await?;
        let split = self.preparer.split(&document)?;
        self.emit(PipelineEvent::DocumentSplit {
            coarse: split.coarse.len(),
            fine: split.fine.len(),
        });
        Ok(split)
    }

    /// Process one document end to end.
    ///
    /// Fails only when the document cannot be loaded or the index cannot be
    /// built; per-chunk and per-question failures land in the report.
    #[instrument(skip(self))]
    pub async fn run(&self, path: &Path) -> Result<RunOutput> {
        let mut report = RunReport::new(path);
        info!("Run {} started for {}", report.run_id, path.display());

        // Step 1: load and split
        let document = self.load(path).await?;
        let split = self.preparer.split(&document)?;
        report.coarse_chunks = split.coarse.len();
        report.fine_chunks = split.fine.len();
        self.emit(PipelineEvent::DocumentSplit {
            coarse: split.coarse.len(),
            fine: split.fine.len(),
        });

        // Step 2: draft every question before any answering
        let set = self.questions.generate(&split.coarse).await;
        report.questions_generated = set.questions.len();
        report.skipped_chunks = set.skipped;
        self.emit(PipelineEvent::QuestionsGenerated {
            count: report.questions_generated,
            skipped_chunks: report.skipped_chunks.len(),
        });

        // Step 3: cap
        report.question_limit = self.question_limit;
        let total = set.questions.len();
        let (to_answer, unprocessed) = apply_question_limit(set.questions, self.question_limit);
        if let Some(limit) = self.question_limit {
            if limit < total {
                info!("Answering the first {} of {} questions", limit, total);
                self.emit(PipelineEvent::QuestionLimitApplied { limit, total });
            }
        }
        report.unprocessed_questions = unprocessed;

        // Step 4: index fully built before the first answer
        let answers = if to_answer.is_empty() {
            warn!("No questions to answer; skipping index build");
            Vec::new()
        } else {
            let index = self
                .answers
                .build_index(&split.fine, (self.store_factory)())
                .await?;
            self.emit(PipelineEvent::IndexBuilt {
                chunks: index.len(),
            });

            // Step 5: answer
            self.emit(PipelineEvent::Answering {
                count: to_answer.len(),
            });
            self.answers.answer_all(&to_answer, &index).await
        };

        report.questions_answered = answers.iter().filter(|a| a.is_answered()).count();
        report.unanswered = answers
            .iter()
            .filter_map(|a| match &a.status {
                AnswerStatus::Unanswered { stage, reason, .. } => Some(UnansweredQuestion {
                    number: a.question_number,
                    kind: *stage,
                    reason: reason.clone(),
                }),
                AnswerStatus::Answered => None,
            })
            .collect();
        report.finish();

        self.emit(PipelineEvent::Finished {
            answered: report.questions_answered,
            unanswered: report.unanswered.len(),
        });
        info!("{}", report.summary());

        Ok(RunOutput {
            source: document.source,
            questions: to_answer,
            answers,
            report,
        })
    }

    /// `run`, then hand the result to `sink`.
    pub async fn run_to_sink(
        &self,
        path: &Path,
        sink: &dyn OutputSink,
    ) -> Result<(RunOutput, PathBuf)> {
        let output = self.run(path).await?;
        let written = sink.write(&output)?;
        info!("Wrote {} answers to {}", output.answers.len(), written.display());
        Ok((output, written))
    }
}

/// Split off everything past the first `limit` questions.
pub fn apply_question_limit(
    mut questions: Vec<Question>,
    limit: Option<usize>,
) -> (Vec<Question>, Vec<Question>) {
    match limit {
        Some(limit) if limit < questions.len() => {
            let rest = questions.split_off(limit);
            (questions, rest)
        }
        _ => (questions, Vec::new()),
    }
}
