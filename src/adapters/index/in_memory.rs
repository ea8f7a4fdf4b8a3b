//! In-memory product index for tests and local development.
//!
//! Scores products by naive term overlap with the query. Usage is derived
//! from the query's word count so aggregation logic can be exercised
//! deterministically without an embedding service.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::ports::{EmbeddingUsage, IndexError, ProductIndex, ProductMatch, SearchResponse};

/// Product index backed by an in-memory catalog.
#[derive(Default)]
pub struct InMemoryProductIndex {
    catalog: Vec<ProductMatch>,
    fail_with: Mutex<Option<IndexError>>,
}

impl InMemoryProductIndex {
    /// Creates an index over the given catalog.
    pub fn new(catalog: Vec<ProductMatch>) -> Self {
        Self {
            catalog,
            fail_with: Mutex::new(None),
        }
    }

    /// Makes the next searches fail with the given error.
    pub fn fail_with(&self, error: IndexError) {
        *self.fail_with.lock().expect("fail lock") = Some(error);
    }

    fn score(query_terms: &[String], content: &str) -> usize {
        let content = content.to_lowercase();
        query_terms
            .iter()
            .filter(|term| content.contains(term.as_str()))
            .count()
    }
}

#[async_trait]
impl ProductIndex for InMemoryProductIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<SearchResponse, IndexError> {
        if let Some(error) = self.fail_with.lock().expect("fail lock").clone() {
            return Err(error);
        }

        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut scored: Vec<(usize, &ProductMatch)> = self
            .catalog
            .iter()
            .map(|product| (Self::score(&terms, &product.content), product))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let word_count = terms.len() as u64;
        Ok(SearchResponse {
            matches: scored
                .into_iter()
                .take(top_k)
                .map(|(_, product)| product.clone())
                .collect(),
            usage: Some(EmbeddingUsage::new(word_count, word_count)),
        })
    }
}
