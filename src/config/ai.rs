//! Generation and retrieval capability configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Gemini generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Gemini API key
    pub gemini_api_key: String,

    /// Base URL override for the Gemini API
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Fallback model pool, comma-separated, preferred model first
    #[serde(default = "default_model_pool")]
    pub model_pool: String,

    /// Retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Reasoning unit budget for thinking-capable models
    #[serde(default = "default_reasoning_budget")]
    pub reasoning_budget: u32,
}

impl AiConfig {
    /// Model pool as an ordered list
    pub fn model_pool_list(&self) -> Vec<String> {
        self.model_pool
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect()
    }

    /// Validate AI configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(ValidationError::MissingRequired("ai.gemini_api_key"));
        }
        if self.model_pool_list().is_empty() {
            return Err(ValidationError::EmptyModelPool);
        }
        Ok(())
    }
}

/// Librarian retrieval service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LibrarianConfigSection {
    /// Base URL of the retrieval service
    #[serde(default = "default_librarian_url")]
    pub base_url: String,

    /// Bearer token for the retrieval service
    #[serde(default)]
    pub api_key: String,
}

impl LibrarianConfigSection {
    /// Validate librarian configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidLibrarianUrl);
        }
        Ok(())
    }
}

impl Default for LibrarianConfigSection {
    fn default() -> Self {
        Self {
            base_url: default_librarian_url(),
            api_key: String::new(),
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model_pool() -> String {
    "gemini-2.5-flash-lite,gemini-2.0-flash-lite".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_reasoning_budget() -> u32 {
    1024
}

fn default_librarian_url() -> String {
    "http://localhost:8100".to_string()
}
