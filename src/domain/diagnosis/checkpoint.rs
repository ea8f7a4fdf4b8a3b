//! Checkpoint extraction - detects the terminal diagnosis marker in
//! assistant responses.
//!
//! The diagnostic agent signals a finished diagnosis by embedding a literal
//! `[CHECKPOINT: <VITAL>]` marker in otherwise free-form text. This module
//! recognizes the marker, strips it, and reports the diagnosed vital. It is
//! pure and synchronous so it can be exercised standalone in tests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// The four hair vitals a diagnosis can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vital {
    Moisture,
    Definition,
    Scalp,
    Breakage,
}

impl Vital {
    /// All vitals, in marker-grammar order.
    pub const ALL: [Vital; 4] = [
        Vital::Moisture,
        Vital::Definition,
        Vital::Scalp,
        Vital::Breakage,
    ];

    /// Uppercase label as it appears inside a checkpoint marker.
    pub fn marker_label(&self) -> &'static str {
        match self {
            Vital::Moisture => "MOISTURE",
            Vital::Definition => "DEFINITION",
            Vital::Scalp => "SCALP",
            Vital::Breakage => "BREAKAGE",
        }
    }

    /// Lowercase name used in API payloads and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vital::Moisture => "moisture",
            Vital::Definition => "definition",
            Vital::Scalp => "scalp",
            Vital::Breakage => "breakage",
        }
    }

    /// Parses a vital name case-insensitively.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        for vital in Self::ALL {
            if s.eq_ignore_ascii_case(vital.marker_label()) {
                return Ok(vital);
            }
        }
        Err(ValidationError::UnknownVital(s.to_string()))
    }
}

impl fmt::Display for Vital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of scanning an assistant response for a checkpoint marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Response text with every marker removed and the ends trimmed.
    pub clean_text: String,
    /// Diagnosed vital, if a marker was present.
    pub vital: Option<Vital>,
}

/// Scans `text` for `[CHECKPOINT: <VITAL>]` markers.
///
/// The keyword match is case-insensitive and whitespace is allowed around the
/// vital name. When no marker is present the text is returned unchanged. When
/// several markers are present the first one wins; this is the defined
/// tie-break, not an error - the guard directives make multiple markers
/// unlikely but not unreachable. All markers are removed from the clean text
/// so that re-extraction is the identity.
pub fn extract(text: &str) -> Extraction {
    let mut vital = None;
    let mut clean = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((before, marker_vital, after)) = split_at_marker(rest) {
        clean.push_str(before);
        if vital.is_none() {
            vital = Some(marker_vital);
        }
        rest = after;
    }
    clean.push_str(rest);

    if vital.is_none() {
        return Extraction {
            clean_text: text.to_string(),
            vital: None,
        };
    }

    Extraction {
        clean_text: clean.trim().to_string(),
        vital,
    }
}

/// Finds the first well-formed marker in `text`, returning the text before
/// it, the parsed vital, and the text after it.
fn split_at_marker(text: &str) -> Option<(&str, Vital, &str)> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('[') {
        let start = search_from + offset;
        if let Some((len, vital)) = parse_marker(&text[start..]) {
            return Some((&text[..start], vital, &text[start + len..]));
        }
        search_from = start + 1;
    }
    None
}

/// Attempts to parse a marker at the start of `s` (which begins with `[`).
/// Returns the marker's byte length and the vital it names.
///
/// Works on bytes so that multi-byte characters near a stray `[` cannot
/// cause a slice panic; the marker grammar itself is pure ASCII.
fn parse_marker(s: &str) -> Option<(usize, Vital)> {
    const KEYWORD: &[u8] = b"CHECKPOINT:";
    let bytes = s.as_bytes();
    let mut pos = 1;

    if bytes.len() < pos + KEYWORD.len() || !bytes[pos..pos + KEYWORD.len()].eq_ignore_ascii_case(KEYWORD) {
        return None;
    }
    pos += KEYWORD.len();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }

    let word_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    let word = std::str::from_utf8(&bytes[word_start..pos]).ok()?;
    let vital = Vital::parse(word).ok()?;

    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if pos >= bytes.len() || bytes[pos] != b']' {
        return None;
    }
    Some((pos + 1, vital))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn no_marker_is_identity() {
        let text = "Is it snapping when you touch it, or just feeling rough?";
        let result = extract(text);
        assert_eq!(result.clean_text, text);
        assert_eq!(result.vital, None);
    }

    #[test]
    fn single_marker_is_removed_and_trimmed() {
        let result = extract("Understood. Let me help you track this. [CHECKPOINT: BREAKAGE]");
        assert_eq!(result.clean_text, "Understood. Let me help you track this.");
        assert_eq!(result.vital, Some(Vital::Breakage));
    }

    #[test]
    fn marker_match_is_case_insensitive() {
        let result = extract("Done. [checkpoint: moisture]");
        assert_eq!(result.vital, Some(Vital::Moisture));
        assert_eq!(result.clean_text, "Done.");
    }

    #[test]
    fn whitespace_around_vital_is_accepted() {
        let result = extract("Done. [CHECKPOINT:   SCALP  ]");
        assert_eq!(result.vital, Some(Vital::Scalp));
    }

    #[test]
    fn marker_in_the_middle_keeps_surrounding_text() {
        let result = extract("Before. [CHECKPOINT: DEFINITION] After.");
        assert_eq!(result.clean_text, "Before.  After.");
        assert_eq!(result.vital, Some(Vital::Definition));
    }

    #[test]
    fn unknown_category_is_not_a_marker() {
        let text = "Weird output [CHECKPOINT: SHINE] here";
        let result = extract(text);
        assert_eq!(result.clean_text, text);
        assert_eq!(result.vital, None);
    }

    #[test]
    fn malformed_marker_is_ignored() {
        let text = "A [CHECKPOINT BREAKAGE] B [CHECK: SCALP] C";
        let result = extract(text);
        assert_eq!(result.clean_text, text);
        assert_eq!(result.vital, None);
    }

    #[test]
    fn first_marker_wins_on_multiple() {
        let result = extract("[CHECKPOINT: SCALP] text [CHECKPOINT: MOISTURE]");
        assert_eq!(result.vital, Some(Vital::Scalp));
        // Both markers are stripped so re-extraction is stable.
        assert_eq!(result.clean_text, "text");
    }

    #[test]
    fn extraction_is_idempotent() {
        let first = extract("Got it [CHECKPOINT: MOISTURE] thanks [CHECKPOINT: SCALP]");
        let second = extract(&first.clean_text);
        assert_eq!(second.clean_text, first.clean_text);
        assert_eq!(second.vital, None);
    }

    #[test]
    fn vital_parse_round_trips_labels() {
        for vital in Vital::ALL {
            assert_eq!(Vital::parse(vital.marker_label()).unwrap(), vital);
            assert_eq!(Vital::parse(vital.as_str()).unwrap(), vital);
        }
        assert!(Vital::parse("volume").is_err());
    }

    proptest! {
        #[test]
        fn marker_free_text_is_untouched(text in "[a-zA-Z0-9 .,!?']{0,200}") {
            // No '[' means no marker can exist.
            prop_assume!(!text.contains('['));
            let result = extract(&text);
            prop_assert_eq!(result.clean_text, text);
            prop_assert_eq!(result.vital, None);
        }

        #[test]
        fn well_formed_marker_is_always_found(
            prefix in "[a-zA-Z0-9 .,!?']{0,80}",
            suffix in "[a-zA-Z0-9 .,!?']{0,80}",
            which in 0usize..4,
        ) {
            let vital = Vital::ALL[which];
            let text = format!("{}[CHECKPOINT: {}]{}", prefix, vital.marker_label(), suffix);
            let result = extract(&text);
            prop_assert_eq!(result.vital, Some(vital));
            prop_assert!(!result.clean_text.contains("CHECKPOINT"));
        }

        #[test]
        fn extraction_of_one_marker_is_idempotent(
            prefix in "[a-zA-Z0-9 .,!?']{0,80}",
            suffix in "[a-zA-Z0-9 .,!?']{0,80}",
            which in 0usize..4,
        ) {
            let vital = Vital::ALL[which];
            let text = format!("{} [CHECKPOINT: {}] {}", prefix, vital.marker_label(), suffix);
            let first = extract(&text);
            let second = extract(&first.clean_text);
            prop_assert_eq!(second.clean_text, first.clean_text);
            prop_assert_eq!(second.vital, None);
        }
    }
}
