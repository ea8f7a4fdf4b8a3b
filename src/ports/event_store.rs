//! Event Store Port - persistence of finalized diagnostic events and
//! generated routines.
//!
//! The core treats persistence as a fallible, best-effort collaborator:
//! reads degrade to empty results at call sites, and session teardown is a
//! cleanup step rather than a correctness requirement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::diagnosis::Vital;
use crate::domain::foundation::{EventId, SessionId, UserId};

/// A finalized diagnostic outcome for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub id: EventId,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub vital: Vital,
    /// Severity the user reported on the 1-10 slider, when provided.
    pub vital_score: Option<u8>,
    pub summary: String,
    pub keywords: Vec<String>,
    pub wash_day_number: Option<u32>,
    pub day_in_cycle: Option<u32>,
    pub recorded_at: DateTime<Utc>,
}

impl DiagnosticEvent {
    /// Formats this event as one line of prompt context.
    pub fn prompt_line(&self, now: DateTime<Utc>) -> String {
        let keywords = if self.keywords.is_empty() {
            "none".to_string()
        } else {
            self.keywords
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        let score = self
            .vital_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let wash_day = self
            .wash_day_number
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "- {}: {} [Category: {}, Severity: {}/10, Wash Day: {}, Keywords: {}]",
            format_time_ago(self.recorded_at, now),
            self.summary,
            self.vital.marker_label(),
            score,
            wash_day,
            keywords
        )
    }
}

/// Renders recent events as the historical-context block injected into the
/// diagnostic prompt. Returns an empty string for an empty slice.
pub fn format_prompt_context(events: &[DiagnosticEvent]) -> String {
    let now = Utc::now();
    events
        .iter()
        .map(|event| event.prompt_line(now))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable relative timestamp for prompt context lines.
fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let days = delta.num_days();
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };
    if days >= 365 {
        plural(days / 365, "year")
    } else if days >= 30 {
        plural(days / 30, "month")
    } else if days >= 7 {
        plural(days / 7, "week")
    } else if days > 0 {
        plural(days, "day")
    } else if delta.num_hours() > 0 {
        plural(delta.num_hours(), "hour")
    } else if delta.num_minutes() > 0 {
        plural(delta.num_minutes(), "minute")
    } else {
        "just now".to_string()
    }
}

/// Persistence errors. All store calls are best-effort at call sites.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("record not found")]
    NotFound,
}

/// Port for diagnostic-event and routine persistence.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists a finalized diagnostic event.
    async fn save_event(&self, event: DiagnosticEvent) -> Result<DiagnosticEvent, StoreError>;

    /// Returns the most recent events for a user, newest first.
    async fn recent_events(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<DiagnosticEvent>, StoreError>;

    /// Returns all events for a user, newest first.
    async fn events_by_user(&self, user: &UserId) -> Result<Vec<DiagnosticEvent>, StoreError>;

    /// Persists a generated routine for a user.
    async fn save_routine(
        &self,
        user: &UserId,
        routine: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Returns the most recently saved routine for a user.
    async fn active_routine(&self, user: &UserId) -> Result<Option<serde_json::Value>, StoreError>;

    /// Discards any persisted chat turns for a session. Idempotent.
    async fn clear_session(&self, session: &SessionId) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_event(recorded_at: DateTime<Utc>) -> DiagnosticEvent {
        DiagnosticEvent {
            id: EventId::new(),
            user_id: UserId::new("user-1").unwrap(),
            session_id: SessionId::new("session-1").unwrap(),
            vital: Vital::Breakage,
            vital_score: Some(7),
            summary: "High breakage on day 5, worst when brushing dry.".into(),
            keywords: vec!["mechanical damage".into(), "low elasticity".into()],
            wash_day_number: Some(5),
            day_in_cycle: Some(5),
            recorded_at,
        }
    }

    #[test]
    fn prompt_line_carries_category_severity_and_keywords() {
        let now = Utc::now();
        let line = sample_event(now - Duration::days(3)).prompt_line(now);
        assert!(line.starts_with("- 3 days ago: High breakage"));
        assert!(line.contains("Category: BREAKAGE"));
        assert!(line.contains("Severity: 7/10"));
        assert!(line.contains("Wash Day: 5"));
        assert!(line.contains("mechanical damage, low elasticity"));
    }

    #[test]
    fn prompt_line_handles_missing_metadata() {
        let now = Utc::now();
        let mut event = sample_event(now);
        event.vital_score = None;
        event.wash_day_number = None;
        event.keywords.clear();
        let line = event.prompt_line(now);
        assert!(line.contains("Severity: N/A/10"));
        assert!(line.contains("Wash Day: unknown"));
        assert!(line.contains("Keywords: none"));
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc::now();
        let case = |delta: Duration| format_time_ago(now - delta, now);
        assert_eq!(case(Duration::seconds(10)), "just now");
        assert_eq!(case(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(case(Duration::hours(1)), "1 hour ago");
        assert_eq!(case(Duration::days(1)), "1 day ago");
        assert_eq!(case(Duration::days(10)), "1 week ago");
        assert_eq!(case(Duration::days(65)), "2 months ago");
        assert_eq!(case(Duration::days(800)), "2 years ago");
    }

    #[test]
    fn context_block_joins_events_newest_first_as_given() {
        let now = Utc::now();
        let events = vec![
            sample_event(now - Duration::days(1)),
            sample_event(now - Duration::days(14)),
        ];
        let block = format_prompt_context(&events);
        assert_eq!(block.lines().count(), 2);
        assert!(block.contains("1 day ago"));
        assert!(block.contains("2 weeks ago"));
    }

    #[test]
    fn empty_event_list_formats_to_empty_context() {
        assert_eq!(format_prompt_context(&[]), "");
    }
}
