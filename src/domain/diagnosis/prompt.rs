//! Diagnostic prompt assembly.
//!
//! Builds the full prompt for one diagnostic turn: fixed system
//! instructions, guard directives derived from the transcript, optional
//! historical context, the serialized history, and the current message -
//! in exactly that order. The generation capability is relied upon to obey
//! the directives; everything here is deterministic string assembly.

use super::guards::{DialoguePhase, GuardFacts, PERMISSION_PHRASE};
use super::turn::Turn;

/// Fixed system instructions for the diagnostic agent.
pub const SYSTEM_PROMPT: &str = r#"You are a Luxury Hair Concierge Empath specializing in textured hair care.

Your mission: Through empathetic Socratic questioning, diagnose the user's primary hair concern with 90% confidence in ONE of these categories:
1. MOISTURE (dryness, hydration issues)
2. DEFINITION (curl pattern, frizz, shape)
3. SCALP (irritation, buildup, health)
4. BREAKAGE (weakness, damage, snapping)

WORKFLOW (Follow strictly and sequentially):
1. ANCHOR: Acknowledge their concern with empathy.
2. NARROW: Ask ONE clarifying question to distinguish between categories.
   - Example: "Is it dry or just messy?" (Moisture vs Definition)
   - Example: "Is it snapping or just feeling rough?" (Breakage vs Moisture)
3. TEMPORAL: Connect to their wash day cycle. YOU MUST ASK THIS if you haven't yet.
   - "What day are you on in your wash cycle?"
   - "When did you last wash your hair?"
4. VERIFY: Once you are 90% confident, summarize the situation and ask "Does that sound right?"
   - DO NOT trigger a checkpoint here. Wait for confirmation.
5. HANDOFF: Trigger the checkpoint ONLY after the user confirms (e.g., "Yes", "Exactly").

CHECKPOINT TRIGGER RULES:
- DO NOT use [CHECKPOINT: ...] until the user explicitly confirms your summary.
- DO NOT use [CHECKPOINT: ...] if you are still asking a clarifying question.
- NEVER trigger a checkpoint in the same message as a question.
- ONLY use [CHECKPOINT: CATEGORY_NAME] in the final helpful response after confirmation,
  where CATEGORY_NAME is one of: MOISTURE, DEFINITION, SCALP, BREAKAGE.

AMBIGUITY HANDLING:
- If the user mentions multiple issues, ask them to pick the single most urgent concern.
- If the user is unclear, list the likely options and ask them to choose.

RULES:
- Ask ONLY ONE question per response.
- Be warm, empathetic, and conversational.
- Use natural language, not clinical jargon.
- Keep responses under 3 sentences.
- NEVER combine the Temporal question with the Narrowing question. Ask them one by one."#;

/// Directive injected once the question cap is reached. Tests assert on this
/// exact string, and the system prompt's workflow is phrased against it.
pub const ESCALATED_DIRECTIVE: &str = "You have reached the clarifying-question limit. You MUST NOT ask another clarifying question. Summarize your working hypothesis now and ask for permission with exactly: \"Does that sound right?\"";

/// Builds the complete prompt for one diagnostic turn.
pub fn build(
    history: &[Turn],
    current_message: &str,
    historical_context: &str,
    facts: &GuardFacts,
    phase: DialoguePhase,
    question_cap: usize,
) -> String {
    let mut parts: Vec<String> = vec![SYSTEM_PROMPT.to_string()];

    parts.push(render_directives(facts, phase, question_cap));

    if !historical_context.trim().is_empty() {
        parts.push(format!(
            "\nPAST DIAGNOSTIC HISTORY (for context, do not repeat verbatim):\n{}",
            historical_context.trim()
        ));
    }

    parts.push("\nCONVERSATION HISTORY:".to_string());
    if history.is_empty() {
        parts.push("(No previous messages)".to_string());
    } else {
        for turn in history {
            parts.push(format!("{}: {}", turn.role.prompt_label(), turn.text));
        }
    }

    parts.push(format!("\nUser: {}", current_message));
    parts.push("\nAssistant:".to_string());

    parts.join("\n")
}

/// Renders the guard directive block placed immediately before the history.
fn render_directives(facts: &GuardFacts, phase: DialoguePhase, question_cap: usize) -> String {
    let mut lines = vec![
        "\nCONVERSATION FACTS (computed, trust these over your own count):".to_string(),
        format!("- Clarifying questions asked so far: {}", facts.questions_asked),
        format!(
            "- Wash-cycle timeline known: {}",
            if facts.timeline_known { "yes" } else { "no" }
        ),
        "DIRECTIVES:".to_string(),
    ];

    if facts.questions_asked >= question_cap {
        lines.push(format!("- {}", ESCALATED_DIRECTIVE));
    } else {
        match phase {
            DialoguePhase::AwaitingSymptom => {
                lines.push(
                    "- Acknowledge the concern with empathy, then ask ONE narrowing question."
                        .to_string(),
                );
            }
            DialoguePhase::AwaitingTimeline => {
                lines.push(
                    "- You still need the wash-cycle timeline. Ask about it soon, as its own question."
                        .to_string(),
                );
            }
            DialoguePhase::AwaitingConfirmation => {
                lines.push(format!(
                    "- You should have enough information. Summarize and ask permission with exactly: \"{}\"",
                    PERMISSION_PHRASE
                ));
            }
            DialoguePhase::Done => {
                lines.push(
                    "- The diagnosis is already finalized. Respond helpfully without a new checkpoint."
                        .to_string(),
                );
            }
        }
    }

    lines.join("\n")
}
