//! Resilient completion client over a pool of generation models.
//!
//! Wraps a [`GenerationBackend`] with bounded retry and round-robin model
//! fallback. Retryable failures (capacity exhaustion, unavailable models)
//! rotate to the next model in the pool after an exponential backoff;
//! everything else surfaces to the caller immediately. Fragments already
//! forwarded before a mid-stream failure stay delivered.

use futures::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ports::{
    Fragment, FragmentStream, GenerationBackend, GenerationError, GenerationOptions,
};

/// Fallback pool, preferred model first.
pub const DEFAULT_MODEL_POOL: [&str; 2] = ["gemini-2.5-flash-lite", "gemini-2.0-flash-lite"];

/// Retries after the initial attempt, so at most `DEFAULT_MAX_RETRIES + 1`
/// calls reach the backend.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Reasoning unit budget requested for thinking-capable models.
pub const DEFAULT_REASONING_BUDGET: u32 = 1024;

/// Maps a retry attempt (1-based) to a sleep before that attempt.
pub type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Completion client with retry and model-pool fallback.
pub struct CompletionClient {
    backend: Arc<dyn GenerationBackend>,
    model_pool: Vec<String>,
    max_retries: u32,
    reasoning_budget: u32,
    backoff: BackoffFn,
}

impl CompletionClient {
    /// Creates a client with the default pool, retry budget, and
    /// exponential backoff.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            model_pool: DEFAULT_MODEL_POOL.iter().map(|m| m.to_string()).collect(),
            max_retries: DEFAULT_MAX_RETRIES,
            reasoning_budget: DEFAULT_REASONING_BUDGET,
            backoff: Arc::new(|attempt| Duration::from_secs(1u64 << attempt.min(10))),
        }
    }

    /// Replaces the fallback pool. Must be non-empty.
    pub fn with_model_pool(mut self, pool: Vec<String>) -> Self {
        if !pool.is_empty() {
            self.model_pool = pool;
        }
        self
    }

    /// Overrides the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Overrides the reasoning budget for thinking-capable models.
    pub fn with_reasoning_budget(mut self, budget: u32) -> Self {
        self.reasoning_budget = budget;
        self
    }

    /// Overrides the backoff schedule. Tests inject a zero-delay schedule.
    pub fn with_backoff(mut self, backoff: BackoffFn) -> Self {
        self.backoff = backoff;
        self
    }

    /// First model of the pool.
    pub fn primary_model(&self) -> &str {
        &self.model_pool[0]
    }

    /// Runs one completion, streaming fragments as they arrive.
    ///
    /// `model_hint` selects the starting model; when it names a pool member
    /// fallback continues from that position, otherwise the first fallback
    /// lands on the head of the pool.
    pub fn complete(&self, prompt: &str, model_hint: Option<&str>) -> FragmentStream {
        let backend = Arc::clone(&self.backend);
        let pool = self.model_pool.clone();
        let max_retries = self.max_retries;
        let reasoning_budget = self.reasoning_budget;
        let backoff = Arc::clone(&self.backoff);
        let prompt = prompt.to_string();

        let mut pool_index = model_hint.and_then(|hint| pool.iter().position(|m| m == hint));
        let mut model = model_hint
            .map(str::to_string)
            .unwrap_or_else(|| pool[0].clone());

        let (tx, rx) = mpsc::channel::<Result<Fragment, GenerationError>>(32);

        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                let options = options_for(&model, reasoning_budget);
                debug!(model = %model, attempt, "starting completion call");

                let failure = match backend.invoke(&prompt, &model, options).await {
                    Ok(mut fragments) => {
                        let mut failure = None;
                        while let Some(item) = fragments.next().await {
                            match item {
                                Ok(fragment) => {
                                    if tx.send(Ok(fragment)).await.is_err() {
                                        return;
                                    }
                                }
                                Err(error) => {
                                    failure = Some(error);
                                    break;
                                }
                            }
                        }
                        match failure {
                            None => return,
                            Some(error) => error,
                        }
                    }
                    Err(error) => error,
                };

                if !failure.is_retryable() || attempt >= max_retries {
                    let _ = tx.send(Err(failure)).await;
                    return;
                }

                attempt += 1;
                pool_index = Some(match pool_index {
                    Some(index) => (index + 1) % pool.len(),
                    None => 0,
                });
                let next = pool_index.unwrap_or(0);
                model = pool[next].clone();
                let delay = backoff(attempt);
                warn!(
                    error = %failure,
                    next_model = %model,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retryable completion failure, falling back"
                );
                tokio::time::sleep(delay).await;
            }
        });

        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}

fn options_for(model: &str, reasoning_budget: u32) -> GenerationOptions {
    if model.contains("thinking") {
        GenerationOptions::with_reasoning(reasoning_budget)
    } else {
        GenerationOptions::default()
    }
}

/// Drains a fragment stream into its concatenated content text, dropping
/// reasoning and usage fragments.
pub async fn collect_content(mut fragments: FragmentStream) -> Result<String, GenerationError> {
    let mut text = String::new();
    while let Some(item) = fragments.next().await {
        if let Some(content) = item?.as_content() {
            text.push_str(content);
        }
    }
    Ok(text)
}
