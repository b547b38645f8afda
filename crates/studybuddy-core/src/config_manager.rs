use crate::{ChunkingConfig, RetryPolicy, StudyBuddyError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for StudyBuddyError {
    fn from(err: ConfigError) -> Self {
        StudyBuddyError::Configuration(err.to_string())
    }
}

/// Main configuration for Study Buddy
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StudyBuddyConfig {
    /// Generation backend used for questions and answers
    #[serde(default)]
    pub llm: LLMConfig,

    /// Embedding backend used for the answer index
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Coarse and fine chunk size policies
    #[serde(default)]
    pub chunking: ChunkingSettings,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Retry policy shared by every external call
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM configuration for question and answer generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// LLM provider: "openai" or "gemini"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model identifier
    /// For OpenAI: model name (e.g., "gpt-3.5-turbo-16k")
    /// For Gemini: model name (e.g., "gemini-2.0-flash")
    #[serde(default)]
    pub model: Option<String>,

    /// OpenAI API key
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Gemini API key
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Overrides both stage temperatures when set
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Temperature for question drafting
    #[serde(default = "default_question_temperature")]
    pub question_temperature: f32,

    /// Temperature for answer generation
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,

    /// Maximum tokens to generate per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            openai_api_key: None,
            gemini_api_key: None,
            openai_base_url: default_openai_base_url(),
            gemini_base_url: default_gemini_base_url(),
            temperature: None,
            question_temperature: default_question_temperature(),
            answer_temperature: default_answer_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LLMConfig {
    pub fn effective_question_temperature(&self) -> f32 {
        self.temperature.unwrap_or(self.question_temperature)
    }

    pub fn effective_answer_temperature(&self) -> f32 {
        self.temperature.unwrap_or(self.answer_temperature)
    }

    /// Configured model or the provider's default.
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider.as_str() {
                "gemini" => "gemini-2.0-flash",
                _ => "gpt-3.5-turbo-16k",
            }
            .to_string()
        })
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider: "openai" or "gemini"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model identifier
    /// For OpenAI: "text-embedding-3-small"
    /// For Gemini: "models/gemini-embedding-001"
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            openai_api_key: None,
            gemini_api_key: None,
            openai_base_url: default_openai_base_url(),
            gemini_base_url: default_gemini_base_url(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider.as_str() {
                "gemini" => "models/gemini-embedding-001",
                _ => "text-embedding-3-small",
            }
            .to_string()
        })
    }
}

/// Token-based chunk sizes for both passes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    #[serde(default = "default_question_chunk_size")]
    pub question_chunk_size: usize,

    #[serde(default = "default_question_chunk_overlap")]
    pub question_chunk_overlap: usize,

    #[serde(default = "default_answer_chunk_size")]
    pub answer_chunk_size: usize,

    #[serde(default = "default_answer_chunk_overlap")]
    pub answer_chunk_overlap: usize,

    /// Optional HuggingFace tokenizer.json; the built-in encoder is used otherwise
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            question_chunk_size: default_question_chunk_size(),
            question_chunk_overlap: default_question_chunk_overlap(),
            answer_chunk_size: default_answer_chunk_size(),
            answer_chunk_overlap: default_answer_chunk_overlap(),
            tokenizer_path: None,
        }
    }
}

impl ChunkingSettings {
    pub fn coarse(&self) -> ChunkingConfig {
        ChunkingConfig::new(self.question_chunk_size, self.question_chunk_overlap)
    }

    pub fn fine(&self) -> ChunkingConfig {
        ChunkingConfig::new(self.answer_chunk_size, self.answer_chunk_overlap)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Answer at most this many questions
    #[serde(default)]
    pub question_limit: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            question_limit: None,
        }
    }
}

/// How coarse chunks are turned into questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStrategy {
    /// One independent request per chunk
    #[default]
    PerChunk,
    /// Carry the running list through every chunk and let the model revise it
    Refine,
}

/// Criterion for merging duplicate questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    Exact,
    #[default]
    Normalized,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Document processed when no path is given on the command line
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub question_strategy: QuestionStrategy,

    #[serde(default)]
    pub dedup: DedupMode,

    /// In-flight question requests (PerChunk only)
    #[serde(default = "default_concurrency")]
    pub question_concurrency: usize,

    /// In-flight answer requests
    #[serde(default = "default_concurrency")]
    pub answer_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            question_strategy: QuestionStrategy::default(),
            dedup: DedupMode::default(),
            question_concurrency: default_concurrency(),
            answer_concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_question_temperature() -> f32 {
    0.4
}
fn default_answer_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> usize {
    2048
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_batch_size() -> usize {
    32
}
fn default_question_chunk_size() -> usize {
    10000
}
fn default_question_chunk_overlap() -> usize {
    200
}
fn default_answer_chunk_size() -> usize {
    1000
}
fn default_answer_chunk_overlap() -> usize {
    100
}
fn default_top_k() -> usize {
    4
}
fn default_concurrency() -> usize {
    1
}
fn default_output_path() -> PathBuf {
    PathBuf::from("outputs").join("answers.txt")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

const PROVIDERS: &[&str] = &["openai", "gemini"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json", "compact"];
const REDACTED: &str = "***";

/// Configuration manager with env > file > default precedence
pub struct ConfigManager {
    config: StudyBuddyConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.studybuddy.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        info!("Loading Study Buddy configuration");

        Self::load_dotenv();
        let (config, config_path) = Self::load_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load an explicit config file, still honouring environment overrides.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::load_dotenv();
        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    /// Wrap an already-built configuration after validating it.
    pub fn from_config(config: StudyBuddyConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn finish(config: StudyBuddyConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!("Config file: {}", path.display()),
            None => info!("Config file: none (using defaults)"),
        }
        info!(
            "LLM provider: {} ({})",
            config.llm.provider,
            config.llm.model_or_default()
        );
        info!(
            "Embedding provider: {} ({})",
            config.embedding.provider,
            config.embedding.model_or_default()
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("Loaded .env file from current directory");
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".studybuddy.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .studybuddy.env: {}", e);
                } else {
                    info!("Loaded .studybuddy.env from home directory");
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.studybuddy.toml
    /// 2. ~/.studybuddy/config.toml
    /// 3. Defaults
    fn load_config_file() -> Result<(StudyBuddyConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".studybuddy.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                let config = Self::read_toml_file(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((StudyBuddyConfig::default(), None))
    }

    /// `~/.studybuddy/config.toml`, if a home directory exists
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".studybuddy").join("config.toml"))
    }

    fn read_toml_file(path: &Path) -> Result<StudyBuddyConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(config: StudyBuddyConfig) -> StudyBuddyConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; the process environment in production.
    pub fn apply_overrides<F>(mut config: StudyBuddyConfig, lookup: F) -> StudyBuddyConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("FILE_PATH") {
            config.pipeline.file_path = Some(PathBuf::from(path));
        }
        if let Some(limit) = lookup("QUESTION_LIMIT") {
            match limit.trim().parse::<usize>() {
                Ok(n) => config.retrieval.question_limit = Some(n),
                Err(_) => warn!("Ignoring invalid QUESTION_LIMIT value: {:?}", limit),
            }
        }

        // LLM configuration
        if let Some(provider) = lookup("STUDYBUDDY_LLM_PROVIDER") {
            config.llm.provider = provider.to_lowercase();
        }
        if let Some(model) = lookup("STUDYBUDDY_MODEL") {
            config.llm.model = Some(model);
        }
        if let Some(temp) = lookup("STUDYBUDDY_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.llm.temperature = Some(t);
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key.clone());
            config.embedding.openai_api_key = Some(key);
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            config.llm.gemini_api_key = Some(key.clone());
            config.embedding.gemini_api_key = Some(key);
        }

        // Embedding configuration
        if let Some(provider) = lookup("STUDYBUDDY_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.to_lowercase();
        }
        if let Some(model) = lookup("STUDYBUDDY_EMBEDDING_MODEL") {
            config.embedding.model = Some(model);
        }

        if let Some(top_k) = lookup("STUDYBUDDY_TOP_K") {
            if let Ok(k) = top_k.parse() {
                config.retrieval.top_k = k;
            }
        }
        if let Some(path) = lookup("STUDYBUDDY_TOKENIZER_PATH") {
            config.chunking.tokenizer_path = Some(PathBuf::from(path));
        }

        // RUST_LOG may carry full filter directives; only a bare level maps onto the config
        if let Some(level) = lookup("RUST_LOG") {
            let level = level.to_lowercase();
            if LOG_LEVELS.contains(&level.as_str()) {
                config.logging.level = level;
            }
        }

        config
    }

    pub fn validate_config(config: &StudyBuddyConfig) -> Result<(), ConfigError> {
        if !PROVIDERS.contains(&config.llm.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid LLM provider: {}. Must be one of: {}",
                config.llm.provider,
                PROVIDERS.join(", ")
            )));
        }
        if !PROVIDERS.contains(&config.embedding.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid embedding provider: {}. Must be one of: {}",
                config.embedding.provider,
                PROVIDERS.join(", ")
            )));
        }

        let temperatures = [
            ("llm.temperature", config.llm.temperature),
            (
                "llm.question_temperature",
                Some(config.llm.question_temperature),
            ),
            ("llm.answer_temperature", Some(config.llm.answer_temperature)),
        ];
        for (name, value) in temperatures {
            if let Some(t) = value {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::ValidationError(format!(
                        "{} must be between 0.0 and 2.0, got {}",
                        name, t
                    )));
                }
            }
        }

        config
            .chunking
            .coarse()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("question chunking: {}", e)))?;
        config
            .chunking
            .fine()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("answer chunking: {}", e)))?;

        if config.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if config.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if config.pipeline.question_concurrency == 0 || config.pipeline.answer_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline concurrency must be at least 1".to_string(),
            ));
        }

        config
            .retry
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log format: {}. Must be one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            )));
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &StudyBuddyConfig {
        &self.config
    }

    pub fn into_config(self) -> StudyBuddyConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Effective configuration as TOML with API keys masked.
    pub fn redacted_toml(&self) -> Result<String, ConfigError> {
        let mut config = self.config.clone();
        for key in [
            &mut config.llm.openai_api_key,
            &mut config.llm.gemini_api_key,
            &mut config.embedding.openai_api_key,
            &mut config.embedding.gemini_api_key,
        ] {
            if key.is_some() {
                *key = Some(REDACTED.to_string());
            }
        }
        toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = StudyBuddyConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
