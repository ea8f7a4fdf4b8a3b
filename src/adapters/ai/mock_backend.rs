//! Scripted generation backend for tests.
//!
//! Plays back a queued script of per-call outcomes and records every
//! invocation so tests can assert on retry and fallback behavior without a
//! network.

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::ports::{
    Fragment, FragmentStream, GenerationBackend, GenerationError, GenerationOptions, UnitUsage,
};

/// One scripted call outcome.
#[derive(Debug, Clone)]
pub enum ScriptedCall {
    /// The call succeeds and streams these fragments.
    Fragments(Vec<Fragment>),
    /// The call fails before producing any fragment.
    Failure(GenerationError),
    /// The call streams some fragments, then fails mid-stream.
    FragmentsThenFailure(Vec<Fragment>, GenerationError),
}

/// A recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub model: String,
    pub options: GenerationOptions,
}

/// Generation backend that replays a fixed script.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<ScriptedCall>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    /// Creates a backend with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful call streaming the given fragments.
    pub fn push_fragments(&self, fragments: Vec<Fragment>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(ScriptedCall::Fragments(fragments));
    }

    /// Queues a successful call streaming `text` as content plus a usage
    /// record.
    pub fn push_text(&self, text: &str, usage: UnitUsage) {
        self.push_fragments(vec![
            Fragment::Content(text.to_string()),
            Fragment::Usage(usage),
        ]);
    }

    /// Queues a call that fails outright.
    pub fn push_failure(&self, error: GenerationError) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(ScriptedCall::Failure(error));
    }

    /// Queues a call that streams fragments and then fails.
    pub fn push_fragments_then_failure(&self, fragments: Vec<Fragment>, error: GenerationError) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(ScriptedCall::FragmentsThenFailure(fragments, error));
    }

    /// Returns every invocation recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Returns the prompt of the `n`-th invocation.
    pub fn prompt(&self, n: usize) -> String {
        self.calls()[n].prompt.clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        options: GenerationOptions,
    ) -> Result<FragmentStream, GenerationError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            prompt: prompt.to_string(),
            model: model.to_string(),
            options,
        });

        let next = self.script.lock().expect("script lock").pop_front();
        let items: Vec<Result<Fragment, GenerationError>> = match next {
            Some(ScriptedCall::Fragments(fragments)) => fragments.into_iter().map(Ok).collect(),
            Some(ScriptedCall::Failure(error)) => return Err(error),
            Some(ScriptedCall::FragmentsThenFailure(fragments, error)) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(error)))
                .collect(),
            None => {
                return Err(GenerationError::InvalidRequest(
                    "scripted backend: script exhausted".to_string(),
                ))
            }
        };

        Ok(Box::pin(stream::iter(items)))
    }
}
