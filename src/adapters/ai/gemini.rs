//! Gemini Backend - [`GenerationBackend`] implementation for Google's
//! Gemini API.
//!
//! Streams completions via SSE (`alt=sse` on `streamGenerateContent`). Each
//! `data:` line carries candidate parts, optionally marked as thoughts, plus
//! cumulative usage metadata on the final chunk.
//!
//! # Configuration
//!
//! ```ignore
//! let config = GeminiConfig::new(api_key)
//!     .with_base_url("https://generativelanguage.googleapis.com");
//!
//! let backend = GeminiBackend::new(config);
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::{
    Fragment, FragmentStream, GenerationBackend, GenerationError, GenerationOptions, UnitUsage,
};

/// Configuration for the Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Base URL for the API.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Gemini API backend implementation.
pub struct GeminiBackend {
    config: GeminiConfig,
    client: Client,
}

impl GeminiBackend {
    /// Creates a new Gemini backend with the given configuration.
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Builds the streaming-generation endpoint URL for one model.
    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, model
        )
    }

    fn to_gemini_request(&self, prompt: &str, options: &GenerationOptions) -> GeminiRequest {
        let generation_config = options.reasoning.then(|| GeminiGenerationConfig {
            thinking_config: Some(ThinkingConfig {
                thinking_budget: options.reasoning_budget,
                include_thoughts: true,
            }),
        });

        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config,
        }
    }

    async fn send_streaming_request(
        &self,
        prompt: &str,
        model: &str,
        options: &GenerationOptions,
    ) -> Result<Response, GenerationError> {
        let request = self.to_gemini_request(prompt, options);

        self.client
            .post(self.stream_url(model))
            .header("x-goog-api-key", self.config.api_key())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    GenerationError::network(format!("Connection failed: {}", e))
                } else {
                    GenerationError::network(e.to_string())
                }
            })
    }

    /// Parses the API response status and handles errors.
    async fn handle_response_status(
        &self,
        response: Response,
        model: &str,
    ) -> Result<Response, GenerationError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => Err(GenerationError::AuthenticationFailed),
            429 => Err(GenerationError::capacity_exhausted(parse_retry_delay(
                &error_body,
            ))),
            404 => Err(GenerationError::model_unavailable(model)),
            400 => Err(GenerationError::InvalidRequest(error_body)),
            500..=599 => Err(GenerationError::model_unavailable(format!(
                "{} (server error {})",
                model, status
            ))),
            _ => Err(GenerationError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        options: GenerationOptions,
    ) -> Result<FragmentStream, GenerationError> {
        let response = self.send_streaming_request(prompt, model, &options).await?;
        let response = self.handle_response_status(response, model).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk_result| {
                chunk_result
                    .map_err(|e| GenerationError::network(format!("Stream error: {}", e)))
            })
            .map(|chunk_result| match chunk_result {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    parse_gemini_sse(&text)
                }
                Err(e) => vec![Err(e)],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(stream))
    }
}

/// Parses Gemini's 429 error body for a suggested retry delay in seconds.
///
/// The body nests a `RetryInfo` detail with a `retryDelay` like `"17s"`.
fn parse_retry_delay(error_body: &str) -> u32 {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(error_body) {
        let details = parsed
            .get("error")
            .and_then(|e| e.get("details"))
            .and_then(|d| d.as_array());
        if let Some(details) = details {
            for detail in details {
                if let Some(delay) = detail.get("retryDelay").and_then(|d| d.as_str()) {
                    if let Ok(secs) = delay.trim_end_matches('s').parse::<u32>() {
                        return secs;
                    }
                }
            }
        }
    }
    30
}

/// Parses Gemini SSE format into fragments.
///
/// Gemini's SSE stream uses bare `data:` lines:
/// ```text
/// data: {"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}
/// ```
/// Parts flagged with `"thought": true` are reasoning; `usageMetadata`
/// carries cumulative counters, so each chunk's values are surfaced as a
/// usage fragment and the consumer keeps the latest.
fn parse_gemini_sse(text: &str) -> Vec<Result<Fragment, GenerationError>> {
    let mut results = Vec::new();

    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        if data.trim() == "[DONE]" {
            continue;
        }

        let chunk: GeminiStreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                results.push(Err(GenerationError::parse(format!(
                    "Bad stream chunk: {}",
                    e
                ))));
                continue;
            }
        };

        for candidate in chunk.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                let Some(text) = part.text else { continue };
                if text.is_empty() {
                    continue;
                }
                if part.thought.unwrap_or(false) {
                    results.push(Ok(Fragment::Reasoning(text)));
                } else {
                    results.push(Ok(Fragment::Content(text)));
                }
            }
        }

        if let Some(usage) = chunk.usage_metadata {
            results.push(Ok(Fragment::Usage(UnitUsage {
                prompt_units: usage.prompt_token_count.unwrap_or(0),
                completion_units: usage.candidates_token_count.unwrap_or(0),
                total_units: usage.total_token_count.unwrap_or(0),
            })));
        }
    }

    results
}

// ----- Gemini API Types -----

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "thinkingConfig", skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    thinking_budget: u32,
    #[serde(rename = "includeThoughts")]
    include_thoughts: bool,
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_works() {
        let config = GeminiConfig::new("test-key")
            .with_base_url("https://custom.api.com")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn stream_url_names_the_model() {
        let backend = GeminiBackend::new(GeminiConfig::new("k"));
        assert_eq!(
            backend.stream_url("gemini-2.5-flash-lite"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn reasoning_options_add_thinking_config() {
        let backend = GeminiBackend::new(GeminiConfig::new("k"));
        let request =
            backend.to_gemini_request("hello", &GenerationOptions::with_reasoning(1024));
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"thinkingBudget\":1024"));
        assert!(json.contains("\"includeThoughts\":true"));

        let plain = backend.to_gemini_request("hello", &GenerationOptions::default());
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("thinkingConfig"));
    }

    #[test]
    fn parse_sse_content_part() {
        let data = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#;
        let fragments = parse_gemini_sse(data);

        assert_eq!(fragments.len(), 1);
        assert_eq!(
            fragments[0].as_ref().unwrap(),
            &Fragment::Content("Hello".into())
        );
    }

    #[test]
    fn parse_sse_thought_part_becomes_reasoning() {
        let data =
            r#"data: {"candidates":[{"content":{"parts":[{"text":"weighing","thought":true}]}}]}"#;
        let fragments = parse_gemini_sse(data);

        assert_eq!(
            fragments[0].as_ref().unwrap(),
            &Fragment::Reasoning("weighing".into())
        );
    }

    #[test]
    fn parse_sse_usage_metadata() {
        let data = r#"data: {"candidates":[],"usageMetadata":{"promptTokenCount":120,"candidatesTokenCount":45,"totalTokenCount":165}}"#;
        let fragments = parse_gemini_sse(data);

        assert_eq!(fragments.len(), 1);
        match fragments[0].as_ref().unwrap() {
            Fragment::Usage(usage) => {
                assert_eq!(usage.prompt_units, 120);
                assert_eq!(usage.completion_units, 45);
                assert_eq!(usage.total_units, 165);
            }
            other => panic!("expected usage fragment, got {:?}", other),
        }
    }

    #[test]
    fn parse_sse_multiple_data_lines() {
        let data = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n\ndata: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" there\"}]}}]}";
        let fragments = parse_gemini_sse(data);

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].as_ref().unwrap().as_content(), Some("Hi"));
        assert_eq!(fragments[1].as_ref().unwrap().as_content(), Some(" there"));
    }

    #[test]
    fn parse_sse_ignores_non_data_lines_and_done() {
        let data = ": keepalive\n\ndata: [DONE]";
        assert!(parse_gemini_sse(data).is_empty());
    }

    #[test]
    fn parse_retry_delay_reads_retry_info() {
        let body = r#"{"error":{"code":429,"details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"17s"}]}}"#;
        assert_eq!(parse_retry_delay(body), 17);
    }

    #[test]
    fn parse_retry_delay_defaults_without_detail() {
        assert_eq!(parse_retry_delay("{\"error\":{\"code\":429}}"), 30);
        assert_eq!(parse_retry_delay("not json"), 30);
    }
}
