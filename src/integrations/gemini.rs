use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::generator::CompletionProvider;
use crate::error::{AgentError, AgentResult};

const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (if not provided, will use GOOGLE_API_KEY env var)
    pub api_key: Option<String>,
    /// Model to use
    pub model: String,
    /// Max tokens to generate
    pub max_output_tokens: Option<u32>,
    /// Temperature
    pub temperature: Option<f32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: Some(1024),
            temperature: Some(0.0),
        }
    }
}

/// Google Gemini completion client
///
/// One request, one response; no streaming, no retries. Failures map to
/// `AgentError::Generation` with the provider's message preserved so the
/// user can decide whether to try again.
pub struct GeminiClient {
    config: GeminiConfig,
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> AgentResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                AgentError::config("no API key: set GOOGLE_API_KEY or configure one explicitly")
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| AgentError::generation(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client,
        })
    }

    /// Point the client at a different endpoint (used by tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Send one prompt and return the completion text
    pub async fn generate_content(&self, prompt: &str) -> AgentResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        );

        debug!("Calling {} with model {}", url, self.config.model);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| AgentError::config(format!("invalid API key format: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            }),
        };

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::generation(format!("request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_body) {
                return Err(AgentError::generation(format!(
                    "{} ({})",
                    error_response.error.message, error_response.error.status
                )));
            }

            return Err(AgentError::generation(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_body
            )));
        }

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| AgentError::generation(format!("failed to parse response: {}", e)))?;

        parsed
            .candidates
            .first()
            .and_then(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .find_map(|part| part.text.clone())
            })
            .ok_or_else(|| AgentError::generation("empty completion from model"))
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, prompt: &str) -> AgentResult<String> {
        self.generate_content(prompt).await
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GeminiConfig {
        GeminiConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_creation_empty_key() {
        let config = GeminiConfig {
            api_key: Some(String::new()),
            ..Default::default()
        };
        // an empty explicit key falls back to the env var, then errors
        if std::env::var("GOOGLE_API_KEY").is_err() {
            assert!(GeminiClient::new(config).is_err());
        }
    }

    #[tokio::test]
    async fn test_generate_content_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"SELECT * FROM orders;"}]}}]}"#,
            )
            .create_async()
            .await;

        let client = GeminiClient::new(test_config())
            .unwrap()
            .with_base_url(server.url());

        let text = client.generate_content("show all orders").await.unwrap();
        assert_eq!(text, "SELECT * FROM orders;");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_content_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
            )
            .create_async()
            .await;

        let client = GeminiClient::new(test_config())
            .unwrap()
            .with_base_url(server.url());

        let err = client.generate_content("anything").await.unwrap_err();
        match err {
            AgentError::Generation { message } => {
                assert!(message.contains("API key not valid"));
                assert!(message.contains("INVALID_ARGUMENT"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_content_empty_candidates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let client = GeminiClient::new(test_config())
            .unwrap()
            .with_base_url(server.url());

        let err = client.generate_content("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Generation { .. }));
    }
}
