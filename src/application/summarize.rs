//! Summarizer - condenses a finished diagnostic conversation into a dense
//! report plus technical keywords.
//!
//! Runs as a best-effort post-step after a handoff; the caller wraps it in
//! its own timeout and discards failures.

use std::sync::Arc;

use crate::adapters::ai::{collect_content, CompletionClient};
use crate::domain::diagnosis::Turn;
use crate::ports::GenerationError;

const SUMMARIZER_PROMPT: &str = r#"You are a Technical Hair Analyst.
Goal: Summarize a conversation between a User and a Hair Empath into a dense diagnostic report.

OUTPUT FORMAT:
1. SUMMARY: A 1-2 sentence dense summary focusing on the symptoms and timeline (e.g., "User reporting high breakage on Day 5, specifically when brushing dry hair.").
2. KEYWORDS: A comma-separated list of 3-5 technical hair terms mentioned or inferred (e.g., "mechanical damage, cuticle fatigue, low elasticity").

CONSTRAINTS:
- Be technical and precise.
- Focus on the primary hair concern diagnosed.
- If Wash Day or Day in Cycle was mentioned, include it."#;

/// A parsed diagnostic report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticSummary {
    pub summary: String,
    pub keywords: Vec<String>,
}

/// Conversation summarizer over the completion client.
pub struct Summarizer {
    client: Arc<CompletionClient>,
}

impl Summarizer {
    /// Creates a summarizer.
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }

    /// Summarizes a transcript into a report and keywords.
    pub async fn summarize(&self, history: &[Turn]) -> Result<DiagnosticSummary, GenerationError> {
        let prompt = build_prompt(history);
        let text = collect_content(self.client.complete(&prompt, None)).await?;
        Ok(parse_report(&text))
    }
}

fn build_prompt(history: &[Turn]) -> String {
    let mut parts = vec![SUMMARIZER_PROMPT.to_string(), "\nCONVERSATION HISTORY:".to_string()];
    for turn in history {
        parts.push(format!("{}: {}", turn.role.prompt_label(), turn.text));
    }
    parts.push("\nTECHNICAL REPORT:".to_string());
    parts.join("\n")
}

/// Parses `SUMMARY:` and `KEYWORDS:` lines out of the report text. When no
/// summary line is found, the first line stands in so the caller always gets
/// something to persist.
fn parse_report(text: &str) -> DiagnosticSummary {
    let mut summary = String::new();
    let mut keywords = Vec::new();

    for line in text.trim().lines() {
        if let Some(rest) = strip_label(line, "SUMMARY:") {
            summary = rest.trim().to_string();
        } else if let Some(rest) = strip_label(line, "KEYWORDS:") {
            keywords = rest
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    if summary.is_empty() {
        summary = text.lines().next().unwrap_or_default().trim().to_string();
    }

    DiagnosticSummary { summary, keywords }
}

/// Case-insensitive label match at the start of a line.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    head.eq_ignore_ascii_case(label).then(|| &line[label.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::ScriptedBackend;
    use crate::ports::{GenerationBackend, UnitUsage};

    #[test]
    fn parses_labeled_report_lines() {
        let report = parse_report(
            "SUMMARY: User reporting high breakage on Day 5, worst when brushing dry.\nKEYWORDS: mechanical damage, cuticle fatigue, low elasticity",
        );
        assert!(report.summary.starts_with("User reporting high breakage"));
        assert_eq!(
            report.keywords,
            vec!["mechanical damage", "cuticle fatigue", "low elasticity"]
        );
    }

    #[test]
    fn labels_are_case_insensitive() {
        let report = parse_report("summary: dry ends\nkeywords: dryness");
        assert_eq!(report.summary, "dry ends");
        assert_eq!(report.keywords, vec!["dryness"]);
    }

    #[test]
    fn unlabeled_output_falls_back_to_first_line() {
        let report = parse_report("The user has dry, brittle hair.\nMore detail here.");
        assert_eq!(report.summary, "The user has dry, brittle hair.");
        assert!(report.keywords.is_empty());
    }

    #[test]
    fn empty_keyword_entries_are_dropped() {
        let report = parse_report("SUMMARY: s\nKEYWORDS: one, , two,");
        assert_eq!(report.keywords, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn summarize_builds_transcript_prompt() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(
            "SUMMARY: Breakage on day 5.\nKEYWORDS: breakage",
            UnitUsage::new(80, 20),
        );

        let summarizer = Summarizer::new(Arc::new(CompletionClient::new(
            Arc::clone(&backend) as Arc<dyn GenerationBackend>,
        )));
        let history = vec![
            Turn::user("My hair is snapping"),
            Turn::assistant("What day of your wash cycle are you on?"),
            Turn::user("Day 5"),
        ];
        let report = summarizer.summarize(&history).await.unwrap();

        assert_eq!(report.summary, "Breakage on day 5.");
        let prompt = backend.prompt(0);
        assert!(prompt.contains("Technical Hair Analyst"));
        assert!(prompt.contains("User: My hair is snapping"));
        assert!(prompt.contains("Assistant: What day of your wash cycle are you on?"));
        assert!(prompt.ends_with("TECHNICAL REPORT:"));
    }
}
