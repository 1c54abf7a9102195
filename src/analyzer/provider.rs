//! Hosted and local LLM backends.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{LlmConfig, LlmProviderKind};
use crate::error::{Result, ScrapingError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sends a system instruction plus one user message and returns the reply text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Builds the provider selected in `config`.
pub fn provider_from_config(config: &LlmConfig, api_key: &str) -> Result<Box<dyn LlmProvider>> {
    match config.provider {
        LlmProviderKind::Gemini => Ok(Box::new(GeminiProvider::new(api_key, config)?)),
        LlmProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(config)?)),
    }
}

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ScrapingError::NetworkError(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(api_key: &str, config: &LlmConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ScrapingError::ConfigError("API Key not set".to_string()));
        }
        Ok(Self {
            client: http_client(config.timeout)?,
            api_key: api_key.to_string(),
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            model: config.model_name().to_string(),
            temperature: config.temperature,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(&self, system: &str, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system.to_string() }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }

    fn extract_text(response: GenerateContentResponse) -> Result<String> {
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ScrapingError::AnalysisError("Gemini returned no text".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        debug!("Sending {} prompt characters to Gemini model {}", prompt.len(), self.model);
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(system, prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapingError::NetworkError(format!(
                "Gemini request failed with status {}: {}",
                status, body
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Self::extract_text(parsed)
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Local model served by Ollama, as used with the offline dataset.
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout)?,
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            model: config.model_name().to_string(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        debug!("Sending {} prompt characters to Ollama model {}", prompt.len(), self.model);
        let body = OllamaRequest {
            model: &self.model,
            system,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapingError::NetworkError(format!(
                "Ollama request failed with status {}: {}",
                status, body
            )));
        }

        let parsed: OllamaResponse = response.json().await?;
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gemini_requires_api_key() {
        let result = GeminiProvider::new("  ", &LlmConfig::default());
        assert!(matches!(result, Err(ScrapingError::ConfigError(msg)) if msg == "API Key not set"));
    }

    #[test]
    fn test_gemini_request_shape() {
        let provider = GeminiProvider::new("key", &LlmConfig::default()).unwrap();
        assert_eq!(
            provider.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-8b:generateContent"
        );

        let body = serde_json::to_value(provider.request_body("be helpful", "analyze this")).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "analyze this");
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_gemini_extracts_first_candidate_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "## Issues\n"}, {"text": "- hinge"}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();

        assert_eq!(GeminiProvider::extract_text(response).unwrap(), "## Issues\n- hinge");
    }

    #[test]
    fn test_gemini_empty_candidates_is_an_error() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(matches!(
            GeminiProvider::extract_text(response),
            Err(ScrapingError::AnalysisError(_))
        ));
    }

    #[test]
    fn test_provider_from_config_selects_backend() {
        let mut config = LlmConfig::default();
        config.provider = LlmProviderKind::Ollama;
        let provider = provider_from_config(&config, "").unwrap();
        assert_eq!(provider.name(), "ollama");

        config.provider = LlmProviderKind::Gemini;
        assert!(provider_from_config(&config, "").is_err());
        assert_eq!(provider_from_config(&config, "key").unwrap().name(), "gemini");
    }

    #[test]
    fn test_ollama_request_shape() {
        let body = serde_json::to_value(OllamaRequest {
            model: "mistral",
            system: "sys",
            prompt: "hi",
            stream: false,
            options: OllamaOptions { temperature: 0.5 },
        })
        .unwrap();
        assert_eq!(body, json!({
            "model": "mistral",
            "system": "sys",
            "prompt": "hi",
            "stream": false,
            "options": {"temperature": 0.5}
        }));
    }
}
