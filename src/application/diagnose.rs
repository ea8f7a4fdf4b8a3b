//! Diagnostic agent - one guarded conversational turn.
//!
//! Thin use case over the completion client: derives guard facts and the
//! dialogue phase from the transcript, assembles the prompt, and drains the
//! completion into the raw response text. Checkpoint extraction is the
//! caller's job; error classification is the client's.

use std::sync::Arc;

use crate::adapters::ai::{collect_content, CompletionClient};
use crate::domain::diagnosis::{prompt, DialoguePhase, GuardFacts, Turn, DEFAULT_QUESTION_CAP};
use crate::ports::GenerationError;

/// Runs guarded diagnostic turns against the completion client.
pub struct DiagnosticAgent {
    client: Arc<CompletionClient>,
    question_cap: usize,
}

impl DiagnosticAgent {
    /// Creates an agent with the default question cap.
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self {
            client,
            question_cap: DEFAULT_QUESTION_CAP,
        }
    }

    /// Overrides the clarifying-question cap.
    pub fn with_question_cap(mut self, cap: usize) -> Self {
        self.question_cap = cap;
        self
    }

    /// Produces the raw assistant response for one turn, checkpoint marker
    /// included if the model emitted one.
    pub async fn run_turn(
        &self,
        history: &[Turn],
        current_message: &str,
        historical_context: &str,
    ) -> Result<String, GenerationError> {
        let facts = GuardFacts::compute(history, current_message);
        let phase = DialoguePhase::derive(history, &facts);
        let prompt = prompt::build(
            history,
            current_message,
            historical_context,
            &facts,
            phase,
            self.question_cap,
        );
        collect_content(self.client.complete(&prompt, None)).await
    }
}
