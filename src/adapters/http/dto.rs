//! Wire types for the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::application::ChatTurnResponse;
use crate::domain::intake::IntakeAnswers;
use crate::ports::DiagnosticEvent;

/// POST /api/chat request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
}

/// POST /api/chat response body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub handoff: bool,
    pub target_vital: Option<String>,
    pub session_id: String,
    pub summary: Option<String>,
    pub keywords: Vec<String>,
}

impl From<ChatTurnResponse> for ChatResponse {
    fn from(response: ChatTurnResponse) -> Self {
        Self {
            message: response.message,
            handoff: response.handoff,
            target_vital: response.target_vital.map(|v| v.as_str().to_string()),
            session_id: response.session_id.to_string(),
            summary: response.summary,
            keywords: response.keywords,
        }
    }
}

/// POST /api/event request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveEventRequest {
    pub user_id: String,
    pub session_id: String,
    pub target_vital: String,
    pub vital_value: Option<u8>,
    #[serde(default)]
    pub conversation_summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub wash_day_number: Option<u32>,
    pub day_in_cycle: Option<u32>,
}

/// GET /api/events/{user_id} response body.
#[derive(Debug, Clone, Serialize)]
pub struct UserEventsResponse {
    pub user_id: String,
    pub events: Vec<DiagnosticEvent>,
    pub count: usize,
}

/// DELETE /api/session/{session_id} response body.
#[derive(Debug, Clone, Serialize)]
pub struct ClearSessionResponse {
    pub message: String,
}

/// POST /api/run-orchestrator request body.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorRequest {
    #[serde(flatten)]
    pub answers: IntakeAnswers,
    /// When present, the generated routine is persisted for this user.
    pub user_id: Option<String>,
}

/// Error body for non-streaming routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
