//! Product Index Port - interface to the semantic product-retrieval index.
//!
//! The retrieval capability is metered separately from generation, so its
//! usage record is a distinct type that the pipeline accumulates into its
//! own aggregate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port for semantic product search.
#[async_trait]
pub trait ProductIndex: Send + Sync {
    /// Returns the `top_k` products closest to `query` in the index.
    async fn search(&self, query: &str, top_k: usize) -> Result<SearchResponse, IndexError>;
}

/// One retrieved product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub id: String,
    pub content: String,
}

/// Embedding usage reported by the retrieval capability for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub prompt_units: u64,
    pub total_units: u64,
}

impl EmbeddingUsage {
    /// Creates a usage record.
    pub fn new(prompt_units: u64, total_units: u64) -> Self {
        Self {
            prompt_units,
            total_units,
        }
    }
}

/// Result of one index query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub matches: Vec<ProductMatch>,
    /// Present when the capability reports embedding usage for the query.
    pub usage: Option<EmbeddingUsage>,
}

/// Retrieval capability errors.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("index query failed: {0}")]
    Query(String),
}
