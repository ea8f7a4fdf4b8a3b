//! Generation Port - interface to the text-generation capability.
//!
//! A backend accepts one prompt and asynchronously produces a sequence of
//! typed fragments: content text, reasoning text (for models that declare
//! thinking support), and usage metadata. Callers that don't care about
//! reasoning must filter by fragment kind rather than assume its absence.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// A stream of generation fragments. A failed item terminates the stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, GenerationError>> + Send>>;

/// Port for the text-generation capability.
///
/// Implementations connect to an external generation API and translate its
/// wire format into [`Fragment`]s. Resilience (retry, model fallback) is the
/// caller's concern, not the backend's.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Starts one generation call and returns its fragment stream.
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        options: GenerationOptions,
    ) -> Result<FragmentStream, GenerationError>;
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Request reasoning output from models that support it.
    pub reasoning: bool,
    /// Reasoning unit budget, only meaningful when `reasoning` is set.
    pub reasoning_budget: u32,
}

impl GenerationOptions {
    /// Options with a reasoning budget enabled.
    pub fn with_reasoning(budget: u32) -> Self {
        Self {
            reasoning: true,
            reasoning_budget: budget,
        }
    }
}

/// One unit of a streamed generation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Response text to surface to the caller.
    Content(String),
    /// Model reasoning, surfaced distinctly from content.
    Reasoning(String),
    /// Usage metadata, typically on the final chunk.
    Usage(UnitUsage),
}

impl Fragment {
    /// Returns the content text, if this is a content fragment.
    pub fn as_content(&self) -> Option<&str> {
        match self {
            Fragment::Content(text) => Some(text),
            _ => None,
        }
    }
}

/// Generation usage counters for one call.
///
/// Streamed values are cumulative within a call; the latest record wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitUsage {
    pub prompt_units: u64,
    pub completion_units: u64,
    pub total_units: u64,
}

impl UnitUsage {
    /// Creates usage with an explicit total.
    pub fn new(prompt_units: u64, completion_units: u64) -> Self {
        Self {
            prompt_units,
            completion_units,
            total_units: prompt_units + completion_units,
        }
    }
}

/// Generation capability errors.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Upstream rate limit; retried internally by the completion client.
    #[error("capacity exhausted: retry after {retry_after_secs}s")]
    CapacityExhausted { retry_after_secs: u32 },

    /// The selected model is unknown or unavailable; triggers pool fallback.
    #[error("model unavailable: {model}")]
    ModelUnavailable { model: String },

    /// Malformed request; not retryable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network failure during the call.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its deadline.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },

    /// API key rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Upstream response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl GenerationError {
    /// Creates a capacity-exhausted error.
    pub fn capacity_exhausted(retry_after_secs: u32) -> Self {
        Self::CapacityExhausted { retry_after_secs }
    }

    /// Creates a model-unavailable error.
    pub fn model_unavailable(model: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// True for classifications the completion client absorbs via pool
    /// fallback: capacity exhaustion and unavailable models. Everything
    /// else propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::CapacityExhausted { .. } | GenerationError::ModelUnavailable { .. }
        )
    }
}
