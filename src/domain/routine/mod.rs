//! Routine module - plan synthesis prompt and structured parsing.
//!
//! The routine stage asks the generation capability for a five-step care
//! routine as JSON. This module owns the prompt template, the code-fence
//! cleanup applied to accumulated output, the strict JSON parse (a
//! malformed plan is fatal to a pipeline run), and the retrieval query
//! rendered for each step.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::domain::intake::Advice;

/// One step of a generated care routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineStep {
    pub step: String,
    pub action: String,
    #[serde(deserialize_with = "string_or_seq", default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl RoutineStep {
    /// Renders the retrieval query used to find products for this step.
    pub fn retrieval_query(&self) -> String {
        let ingredients = self.ingredients.join(", ");
        format!(
            "The user needs to: {}. Find products with the following: {}. Remember to {}. Ensure the products fit these criteria.",
            self.action, ingredients, self.notes
        )
    }
}

/// A complete generated routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    #[serde(rename = "routine")]
    pub steps: Vec<RoutineStep>,
}

/// Errors from parsing accumulated plan text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutineParseError {
    #[error("routine output is empty")]
    Empty,

    #[error("routine is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Strips markdown code-fence artifacts the model tends to wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parses accumulated generation output into a [`Routine`].
///
/// Applies fence stripping first; any JSON error is returned verbatim so the
/// caller can surface the raw text for diagnosis.
pub fn parse_routine(text: &str) -> Result<Routine, RoutineParseError> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err(RoutineParseError::Empty);
    }
    serde_json::from_str(&cleaned).map_err(|e| RoutineParseError::InvalidJson(e.to_string()))
}

/// Builds the routine-synthesis prompt from collated intake advice.
pub fn routine_prompt(advice: &Advice) -> String {
    let directives = serde_json::to_string_pretty(&advice.directives).unwrap_or_default();
    let routine_flags = serde_json::to_string_pretty(&advice.routine_flags).unwrap_or_default();

    format!(
        r#"You are the RoutineAgent.
Create a personalized 5-step hair care routine using ONLY the info provided.
Do NOT guess traits or add extra information.
Do NOT recommend specific products; another agent handles that.

Directives:
{directives}

Routine Flags:
{routine_flags}

Output JSON (exact format):
{{
  "routine": [
    {{
      "step": "Cleanse",
      "action": "...",
      "ingredients": ["...", "..."],
      "notes": "..."
    }},
    {{
      "step": "Condition",
      "action": "...",
      "ingredients": ["...", "..."],
      "notes": "..."
    }},
    {{
      "step": "Treat",
      "action": "...",
      "ingredients": ["...", "..."],
      "notes": "..."
    }},
    {{
      "step": "Moisturize / Prep",
      "action": "...",
      "ingredients": ["...", "..."],
      "notes": "..."
    }},
    {{
      "step": "Style & Protect",
      "action": "...",
      "ingredients": ["...", "..."],
      "notes": "..."
    }}
  ]
}}

Return ONLY valid JSON."#
    )
}

/// Accepts either a JSON array of strings or a single string for the
/// `ingredients` field; models occasionally emit the latter.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        Seq(Vec<String>),
        One(String),
    }

    Ok(match StringOrSeq::deserialize(deserializer)? {
        StringOrSeq::Seq(items) => items,
        StringOrSeq::One(single) => vec![single],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intake::{collate_advice, IntakeAnswers};

    const VALID_PLAN: &str = r#"{
        "routine": [
            {
                "step": "Cleanse",
                "action": "Wash with a gentle sulfate-free shampoo",
                "ingredients": ["aloe vera", "glycerin"],
                "notes": "Focus on the scalp"
            },
            {
                "step": "Condition",
                "action": "Apply a rinse-out conditioner",
                "ingredients": ["shea butter"],
                "notes": "Detangle with fingers"
            }
        ]
    }"#;

    #[test]
    fn parses_a_valid_plan() {
        let routine = parse_routine(VALID_PLAN).unwrap();
        assert_eq!(routine.steps.len(), 2);
        assert_eq!(routine.steps[0].step, "Cleanse");
        assert_eq!(routine.steps[0].ingredients, vec!["aloe vera", "glycerin"]);
    }

    #[test]
    fn strips_json_code_fences_before_parsing() {
        let fenced = format!("```json\n{}\n```", VALID_PLAN);
        let routine = parse_routine(&fenced).unwrap();
        assert_eq!(routine.steps.len(), 2);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_routine("not a routine at all").unwrap_err();
        assert!(matches!(err, RoutineParseError::InvalidJson(_)));
    }

    #[test]
    fn empty_output_is_its_own_error() {
        assert_eq!(parse_routine("```json```").unwrap_err(), RoutineParseError::Empty);
    }

    #[test]
    fn single_string_ingredients_are_accepted() {
        let plan = r#"{
            "routine": [
                {"step": "Treat", "action": "Deep condition", "ingredients": "hydrolyzed protein", "notes": "Weekly"}
            ]
        }"#;
        let routine = parse_routine(plan).unwrap();
        assert_eq!(routine.steps[0].ingredients, vec!["hydrolyzed protein"]);
    }

    #[test]
    fn retrieval_query_names_action_ingredients_and_notes() {
        let step = RoutineStep {
            step: "Cleanse".into(),
            action: "Wash with a clarifying shampoo".into(),
            ingredients: vec!["tea tree".into(), "salicylic acid".into()],
            notes: "avoid heavy oils".into(),
        };
        let query = step.retrieval_query();
        assert!(query.contains("Wash with a clarifying shampoo"));
        assert!(query.contains("tea tree, salicylic acid"));
        assert!(query.contains("avoid heavy oils"));
    }

    #[test]
    fn prompt_embeds_directives_and_flags() {
        let advice = collate_advice(&IntakeAnswers {
            porosity: "CCCC".into(),
            scalp: "Oily".into(),
            damage: "No".into(),
            density: "Medium".into(),
            texture: "Curly".into(),
        });
        let prompt = routine_prompt(&advice);
        assert!(prompt.contains("RoutineAgent"));
        assert!(prompt.contains("seal moisture") || prompt.contains("rich moisturizers"));
        assert!(prompt.contains("Return ONLY valid JSON"));
    }
}
