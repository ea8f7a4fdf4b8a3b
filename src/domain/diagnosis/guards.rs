//! Guard facts - conversational discipline computed from the turn log.
//!
//! The generation capability cannot be trusted to pace itself, so before
//! every call we derive two facts from the immutable transcript and inject
//! them as directives: how many narrowing questions have been asked, and
//! whether the user's wash-cycle timeline is already known. The facts are
//! pure functions of the history plus the current message; nothing here is
//! persisted.

use super::checkpoint;
use super::turn::{Turn, TurnRole};

/// Default cap on open narrowing questions before the agent must move to
/// verification.
pub const DEFAULT_QUESTION_CAP: usize = 2;

/// The mandated verification phrase. An assistant turn containing this
/// phrase is a permission request, not a narrowing question.
pub const PERMISSION_PHRASE: &str = "Does that sound right?";

/// Substrings that indicate the user has anchored the concern to their
/// wash-cycle timeline.
pub const TIMELINE_MARKERS: [&str; 5] = ["day", "wash", "last", "yesterday", "ago"];

/// Facts derived from the transcript before each prompt build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardFacts {
    /// Number of assistant turns that asked a narrowing question.
    ///
    /// This is a heuristic proxy: any assistant turn containing `?` counts,
    /// except turns containing the permission phrase. Rhetorical or
    /// multi-part questions are miscounted, deliberately - the upstream
    /// prompt is written against exactly this signal, so "fixing" the count
    /// here would desynchronize the two.
    pub questions_asked: usize,
    /// True if any turn (or the current message) mentions the wash-cycle
    /// timeline.
    pub timeline_known: bool,
}

impl GuardFacts {
    /// Computes guard facts from the history plus the message being handled.
    pub fn compute(history: &[Turn], current_message: &str) -> Self {
        let questions_asked = history
            .iter()
            .filter(|turn| {
                turn.role == TurnRole::Assistant
                    && turn.text.contains('?')
                    && !turn.text.contains(PERMISSION_PHRASE)
            })
            .count();

        let timeline_known = history
            .iter()
            .map(|turn| turn.text.as_str())
            .chain(std::iter::once(current_message))
            .any(contains_timeline_marker);

        Self {
            questions_asked,
            timeline_known,
        }
    }
}

fn contains_timeline_marker(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TIMELINE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Conversation phase, recomputed each turn from the same guard facts.
///
/// There is no stored state machine; the phase is a pure function of the
/// transcript, which keeps the guard logic testable without constructing
/// full prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialoguePhase {
    /// No conversation yet; the next response should acknowledge and narrow.
    AwaitingSymptom,
    /// Concern is being narrowed but the wash-cycle timeline is unknown.
    AwaitingTimeline,
    /// Enough is known; the agent should summarize and ask for confirmation.
    AwaitingConfirmation,
    /// A checkpoint has already been emitted in this session.
    Done,
}

impl DialoguePhase {
    /// Derives the phase from the transcript and precomputed guard facts.
    pub fn derive(history: &[Turn], facts: &GuardFacts) -> Self {
        let checkpoint_emitted = history.iter().any(|turn| {
            turn.role == TurnRole::Assistant && checkpoint::extract(&turn.text).vital.is_some()
        });
        if checkpoint_emitted {
            return DialoguePhase::Done;
        }

        if history.is_empty() {
            return DialoguePhase::AwaitingSymptom;
        }

        let awaiting_confirmation = history
            .iter()
            .rev()
            .find(|turn| turn.role == TurnRole::Assistant)
            .is_some_and(|turn| turn.text.contains(PERMISSION_PHRASE));
        if awaiting_confirmation {
            return DialoguePhase::AwaitingConfirmation;
        }

        if !facts.timeline_known {
            return DialoguePhase::AwaitingTimeline;
        }
        DialoguePhase::AwaitingConfirmation
    }
}
