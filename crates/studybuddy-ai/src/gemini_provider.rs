use crate::llm_provider::*;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for the Gemini provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model to use (e.g., "gemini-2.0-flash")
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
        }
    }
}

/// Google Gemini provider using the `generateContent` endpoint
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!(
                "Gemini API key is required. Set GEMINI_API_KEY environment variable."
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    fn model_path(&self) -> String {
        let model = self.config.model.trim_start_matches("models/");
        format!("models/{}", model)
    }

    /// System messages become `systemInstruction`; everything else is a user turn.
    fn build_request(&self, messages: &[Message], config: &GenerationConfig) -> GenerateRequest {
        let system: Vec<Part> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| Part {
                text: m.content.clone(),
            })
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction: if system.is_empty() {
                None
            } else {
                Some(Content {
                    role: None,
                    parts: system,
                })
            },
            generation_config: GeminiGenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
            },
        }
    }

    async fn send_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<GenerateResponse> {
        let request = self.build_request(messages, config);
        let url = format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.model_path()
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini generateContent API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        response
            .json::<GenerateResponse>()
            .await
            .context("Failed to parse Gemini generateContent response")
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let response = self.send_request(messages, config).await?;
        into_llm_response(response, &self.config.model)
    }

    async fn is_available(&self) -> bool {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.model_path()
        );
        match self
            .client
            .get(url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn into_llm_response(response: GenerateResponse, model: &str) -> Result<LLMResponse> {
    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(anyhow!("Gemini returned no candidates: {}", reason));
        }
    };

    let content = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(anyhow!(
            "Gemini returned an empty completion (finishReason: {:?})",
            candidate.finish_reason
        ));
    }

    let usage = response.usage_metadata;
    Ok(LLMResponse {
        content,
        total_tokens: usage.as_ref().and_then(|u| u.total_token_count),
        prompt_tokens: usage.as_ref().and_then(|u| u.prompt_token_count),
        completion_tokens: usage.as_ref().and_then(|u| u.candidates_token_count),
        finish_reason: candidate.finish_reason,
        model: response.model_version.unwrap_or_else(|| model.to_string()),
    })
}

// Gemini generateContent request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<usize>,
    #[serde(default)]
    candidates_token_count: Option<usize>,
    #[serde(default)]
    total_token_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> GeminiProvider {
        GeminiProvider::new(GeminiConfig {
            api_key: "test".to_string(),
            model: model.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_provider_creation_requires_api_key() {
        assert!(GeminiProvider::new(GeminiConfig::default()).is_err());
    }

    #[test]
    fn test_model_path_normalisation() {
        assert_eq!(provider("gemini-2.0-flash").model_path(), "models/gemini-2.0-flash");
        assert_eq!(
            provider("models/gemini-2.0-flash").model_path(),
            "models/gemini-2.0-flash"
        );
    }

    #[test]
    fn test_request_moves_system_prompt() {
        let messages = vec![Message::system("be exact"), Message::user("What is DNA?")];
        let config = GenerationConfig::with_temperature(0.1, 512);
        let request = provider(DEFAULT_MODEL).build_request(&messages, &config);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be exact");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn test_response_parsing() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"1. Define "},{"text":"osmosis."}]},
                "finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":20,"candidatesTokenCount":4,"totalTokenCount":24},
                "modelVersion":"gemini-2.0-flash"}"#,
        )
        .unwrap();

        let parsed = into_llm_response(response, DEFAULT_MODEL).unwrap();
        assert_eq!(parsed.content, "1. Define osmosis.");
        assert_eq!(parsed.total_tokens, Some(24));
        assert_eq!(parsed.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = into_llm_response(response, DEFAULT_MODEL).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
