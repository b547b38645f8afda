use crate::gemini_provider::{GeminiEmbeddingConfig, GeminiEmbeddingProvider};
use crate::openai_provider::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};
use crate::providers::EmbeddingProvider;
use std::sync::Arc;
use studybuddy_core::{EmbeddingConfig, Result, StudyBuddyError};
use tracing::info;

/// Factory for creating embedding providers based on configuration
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    pub fn create_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider_name = config.provider.to_lowercase();

        let provider: Arc<dyn EmbeddingProvider> = match provider_name.as_str() {
            "openai" => Arc::new(OpenAiEmbeddingProvider::new(OpenAiEmbeddingConfig::from(
                config,
            ))?),
            "gemini" => Arc::new(GeminiEmbeddingProvider::new(GeminiEmbeddingConfig::from(
                config,
            ))?),
            other => {
                return Err(StudyBuddyError::configuration(format!(
                    "Unsupported embedding provider: {}. Available providers: {}",
                    other,
                    Self::supported_providers().join(", ")
                )))
            }
        };

        info!(
            "Embedding provider: {} ({}, {} dims)",
            provider.provider_name(),
            config.model_or_default(),
            provider.embedding_dimension()
        );
        Ok(provider)
    }

    pub fn supported_providers() -> Vec<&'static str> {
        vec!["openai", "gemini"]
    }
}
