use crate::providers::EmbeddingProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use studybuddy_core::{EmbeddingConfig, Result, StudyBuddyError};
use tokio::time::timeout;
use tracing::debug;

/// batchEmbedContents accepts at most 100 requests per call
const GEMINI_MAX_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct GeminiEmbeddingConfig {
    pub api_key: String,
    /// Fully qualified model resource, e.g. `models/gemini-embedding-001`
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_batch_size: usize,
}

impl Default for GeminiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "models/gemini-embedding-001".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(60),
            max_batch_size: GEMINI_MAX_BATCH,
        }
    }
}

impl From<&EmbeddingConfig> for GeminiEmbeddingConfig {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            api_key: config.gemini_api_key.clone().unwrap_or_default(),
            model: qualified_model(&config.model_or_default()),
            api_base: config.gemini_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_batch_size: config.batch_size.min(GEMINI_MAX_BATCH),
        }
    }
}

fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GoogleApiError {
    error: GoogleErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetails {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Embeddings through the Generative Language API
pub struct GeminiEmbeddingProvider {
    config: GeminiEmbeddingConfig,
    client: Client,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: GeminiEmbeddingConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(StudyBuddyError::configuration(
                "Gemini API key is required. Set GEMINI_API_KEY environment variable.",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("StudyBuddy/0.1")
            .build()
            .map_err(|e| StudyBuddyError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn request_for<'a>(&'a self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.config.model,
            content: Content {
                parts: vec![Part { text }],
            },
        }
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}:{}", self.config.api_base, self.config.model, method);
        let response = timeout(
            self.config.timeout,
            self.client
                .post(url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(body)
                .send(),
        )
        .await
        .map_err(|_| StudyBuddyError::Timeout("Gemini embedding request timed out".to_string()))?
        .map_err(|e| StudyBuddyError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<GoogleApiError>().await {
                Ok(api_error) => format!(
                    "Gemini API error: {} ({})",
                    api_error.error.message,
                    api_error.error.status.unwrap_or_default()
                ),
                Err(_) => format!("Gemini API error: HTTP {}", status),
            };
            return Err(StudyBuddyError::embedding(message));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| StudyBuddyError::embedding(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbedContentResponse =
            self.post("embedContent", &self.request_for(text)).await?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.max_batch_size.clamp(1, GEMINI_MAX_BATCH)) {
            let request = BatchEmbedRequest {
                requests: batch.iter().map(|t| self.request_for(t)).collect(),
            };
            let response: BatchEmbedResponse =
                self.post("batchEmbedContents", &request).await?;
            if response.embeddings.len() != batch.len() {
                return Err(StudyBuddyError::embedding(format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }
            debug!("Gemini embeddings: {} vectors", batch.len());
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }
        Ok(vectors)
    }

    fn embedding_dimension(&self) -> usize {
        match self.config.model.as_str() {
            "models/text-embedding-004" | "models/embedding-001" => 768,
            _ => 3072,
        }
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn is_available(&self) -> bool {
        let health_check = timeout(
            Duration::from_secs(5),
            self.client
                .get(format!("{}/{}", self.config.api_base, self.config.model))
                .header("x-goog-api-key", &self.config.api_key)
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
    fn test_model_is_qualified() {
        let mut section = EmbeddingConfig::default();
        section.provider = "gemini".into();
        section.model = Some("text-embedding-004".into());
        section.batch_size = 500;

        let config = GeminiEmbeddingConfig::from(&section);
        assert_eq!(config.model, "models/text-embedding-004");
        assert_eq!(config.max_batch_size, GEMINI_MAX_BATCH);

        section.model = None;
        assert_eq!(
            GeminiEmbeddingConfig::from(&section).model,
            "models/gemini-embedding-001"
        );
    }

    #[test]
    fn test_batch_request_shape() {
        let mut config = GeminiEmbeddingConfig::default();
        config.api_key = "key".into();
        let provider = GeminiEmbeddingProvider::new(config).unwrap();

        let request = BatchEmbedRequest {
            requests: vec![provider.request_for("alpha"), provider.request_for("beta")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"][1]["model"], "models/gemini-embedding-001");
        assert_eq!(json["requests"][1]["content"]["parts"][0]["text"], "beta");
    }

    #[test]
    fn test_response_parsing() {
        let single: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding":{"values":[0.5,0.25]}}"#).unwrap();
        assert_eq!(single.embedding.values, vec![0.5, 0.25]);

        let batch: BatchEmbedResponse =
            serde_json::from_str(r#"{"embeddings":[{"values":[1.0]},{"values":[2.0]}]}"#)
                .unwrap();
        assert_eq!(batch.embeddings.len(), 2);
    }

    #[test]
    fn test_missing_api_key() {
        assert!(GeminiEmbeddingProvider::new(GeminiEmbeddingConfig::default()).is_err());
    }
}
