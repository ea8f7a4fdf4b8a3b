//! Librarian Index - [`ProductIndex`] implementation backed by the
//! librarian retrieval service.
//!
//! The librarian embeds the query and searches the product vector index,
//! returning matches plus the embedding usage it spent on the query.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::{EmbeddingUsage, IndexError, ProductIndex, ProductMatch, SearchResponse};

/// Configuration for the librarian index client.
#[derive(Debug, Clone)]
pub struct LibrarianConfig {
    /// Bearer token for the retrieval service.
    api_key: Secret<String>,
    /// Base URL of the retrieval service.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl LibrarianConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "http://localhost:8100".to_string(),
            timeout: Duration::from_secs(15),
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

/// HTTP client for the librarian retrieval service.
pub struct LibrarianIndex {
    config: LibrarianConfig,
    client: Client,
}

impl LibrarianIndex {
    /// Creates a new librarian client with the given configuration.
    pub fn new(config: LibrarianConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.config.base_url)
    }
}

#[async_trait]
impl ProductIndex for LibrarianIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<SearchResponse, IndexError> {
        let request = QueryRequest {
            query: query.to_string(),
            top_k,
        };

        let response = self
            .client
            .post(self.query_url())
            .bearer_auth(self.config.api_key())
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexError::Query(format!("librarian request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Query(format!(
                "librarian returned {}: {}",
                status, body
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Query(format!("bad librarian response: {}", e)))?;

        Ok(SearchResponse {
            matches: body
                .matches
                .into_iter()
                .map(|m| ProductMatch {
                    id: m.id,
                    content: m.content,
                })
                .collect(),
            usage: body
                .usage
                .map(|u| EmbeddingUsage::new(u.prompt_tokens, u.total_tokens)),
        })
    }
}

// ----- Librarian wire types -----

#[derive(Debug, Serialize)]
struct QueryRequest {
    query: String,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
    usage: Option<QueryUsage>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct QueryUsage {
    prompt_tokens: u64,
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_works() {
        let config = LibrarianConfig::new("lib-key")
            .with_base_url("https://librarian.internal")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "https://librarian.internal");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.api_key(), "lib-key");
    }

    #[test]
    fn query_url_appends_path() {
        let index = LibrarianIndex::new(LibrarianConfig::new("k"));
        assert_eq!(index.query_url(), "http://localhost:8100/query");
    }

    #[test]
    fn response_with_usage_deserializes() {
        let body = r#"{"matches":[{"id":"p1","content":"Leave-in conditioner"}],"usage":{"prompt_tokens":9,"total_tokens":9}}"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert_eq!(parsed.usage.unwrap().total_tokens, 9);
    }

    #[test]
    fn response_without_usage_deserializes() {
        let parsed: QueryResponse = serde_json::from_str("{\"matches\":[]}").unwrap();
        assert!(parsed.matches.is_empty());
        assert!(parsed.usage.is_none());
    }
}
