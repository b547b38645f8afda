use crate::providers::EmbeddingProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use studybuddy_core::{EmbeddingConfig, Result, StudyBuddyError};
use tokio::time::timeout;
use tracing::debug;

/// Configuration for OpenAI embedding provider
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_batch_size: usize,
}

impl Default for OpenAiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            max_batch_size: 256,
        }
    }
}

impl From<&EmbeddingConfig> for OpenAiEmbeddingConfig {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            api_key: config.openai_api_key.clone().unwrap_or_default(),
            model: config.model_or_default(),
            api_base: config.openai_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_batch_size: config.batch_size,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: usize,
}

/// Error response from OpenAI API
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// OpenAI embedding provider implementation
pub struct OpenAiEmbeddingProvider {
    config: OpenAiEmbeddingConfig,
    client: Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiEmbeddingConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(StudyBuddyError::configuration(
                "OpenAI API key is required. Set OPENAI_API_KEY environment variable.",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("StudyBuddy/0.1")
            .build()
            .map_err(|e| StudyBuddyError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// One `/embeddings` request; vectors come back in input order.
    async fn call_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            input: texts,
            model: &self.config.model,
            encoding_format: "float",
        };

        let response = timeout(
            self.config.timeout,
            self.client
                .post(format!("{}/embeddings", self.config.api_base))
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| StudyBuddyError::Timeout("OpenAI embeddings request timed out".to_string()))?
        .map_err(|e| StudyBuddyError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiError>().await {
                Ok(api_error) => format!(
                    "OpenAI API error: {} ({})",
                    api_error.error.message,
                    api_error.error.error_type.unwrap_or_default()
                ),
                Err(_) => format!("OpenAI API error: HTTP {}", status),
            };
            return Err(StudyBuddyError::embedding(message));
        }

        let body = response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| StudyBuddyError::embedding(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &body.usage {
            debug!(
                "OpenAI embeddings: {} vectors, {} tokens",
                body.data.len(),
                usage.total_tokens
            );
        }

        ordered_vectors(body.data, texts.len())
    }
}

/// Sort response items by their `index` and check nothing is missing.
fn ordered_vectors(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(StudyBuddyError::embedding(format!(
            "expected {} embeddings, received {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|item| item.index);
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.call_api(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| StudyBuddyError::embedding("No embedding returned from OpenAI API"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.max_batch_size.max(1)) {
            vectors.extend(self.call_api(batch).await?);
        }
        Ok(vectors)
    }

    fn embedding_dimension(&self) -> usize {
        match self.config.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        let health_check = timeout(
            Duration::from_secs(5),
            self.client
                .get(format!("{}/models", self.config.api_base))
                .bearer_auth(&self.config.api_key)
                .send(),
        )
        .await;

        matches!(health_check, Ok(Ok(response)) if response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let err = OpenAiEmbeddingProvider::new(OpenAiEmbeddingConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, StudyBuddyError::Configuration(_)));
    }

    #[test]
    fn test_config_from_embedding_section() {
        let mut section = EmbeddingConfig::default();
        section.openai_api_key = Some("sk-test".into());
        section.openai_base_url = "http://localhost:8080/v1/".into();
        section.batch_size = 8;

        let config = OpenAiEmbeddingConfig::from(&section);
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.max_batch_size, 8);
    }

    #[test]
    fn test_response_items_are_reordered() {
        let body: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[0.0,1.0],"index":1},{"embedding":[1.0,0.0],"index":0}],
               "model":"text-embedding-3-small","usage":{"prompt_tokens":4,"total_tokens":4}}"#,
        )
        .unwrap();

        let vectors = ordered_vectors(body.data, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_short_response_is_rejected() {
        let err = ordered_vectors(Vec::new(), 3).unwrap_err();
        assert!(matches!(err, StudyBuddyError::Embedding(_)));
    }
}
