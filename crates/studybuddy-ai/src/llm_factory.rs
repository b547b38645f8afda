use crate::gemini_provider::{GeminiConfig, GeminiProvider};
use crate::llm_provider::*;
use crate::openai_llm_provider::{OpenAIConfig, OpenAIProvider};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use studybuddy_core::LLMConfig;

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    pub fn create_from_config(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let provider_name = config.provider.to_lowercase();

        match provider_name.as_str() {
            "openai" => Self::create_openai_provider(config),
            "gemini" => Self::create_gemini_provider(config),
            _ => Err(anyhow!(
                "Unsupported LLM provider: {}. Available providers: {}",
                provider_name,
                Self::supported_providers().join(", ")
            )),
        }
    }

    fn create_openai_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let api_key = config.openai_api_key.clone().ok_or_else(|| {
            anyhow!(
                "OpenAI API key not found. Set 'llm.openai_api_key' in config \
                 or OPENAI_API_KEY environment variable"
            )
        })?;

        let openai_config = OpenAIConfig {
            api_key,
            base_url: config.openai_base_url.clone(),
            model: config.model_or_default(),
            timeout_secs: config.timeout_secs,
            organization: None,
        };

        Ok(Arc::new(OpenAIProvider::new(openai_config)?))
    }

    fn create_gemini_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let api_key = config.gemini_api_key.clone().ok_or_else(|| {
            anyhow!(
                "Gemini API key not found. Set 'llm.gemini_api_key' in config \
                 or GEMINI_API_KEY environment variable"
            )
        })?;

        let gemini_config = GeminiConfig {
            api_key,
            base_url: config.gemini_base_url.clone(),
            model: config.model_or_default(),
            timeout_secs: config.timeout_secs,
        };

        Ok(Arc::new(GeminiProvider::new(gemini_config)?))
    }

    pub fn supported_providers() -> Vec<&'static str> {
        vec!["openai", "gemini"]
    }
}
