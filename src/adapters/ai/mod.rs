//! AI adapters - generation backends and the resilient completion client.

mod completion_client;
mod gemini;
mod mock_backend;

pub use completion_client::{
    collect_content, BackoffFn, CompletionClient, DEFAULT_MAX_RETRIES, DEFAULT_MODEL_POOL,
    DEFAULT_REASONING_BUDGET,
};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use mock_backend::{RecordedCall, ScriptedBackend, ScriptedCall};
