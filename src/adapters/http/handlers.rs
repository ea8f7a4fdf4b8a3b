//! HTTP handlers connecting Axum routes to the application layer.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Json, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde_json::json;
use thiserror::Error;

use crate::application::{
    ChatService, ChatTurnError, ChatTurnRequest, PipelineRequest, RecordEventError,
    RecordEventRequest, RoutinePipeline,
};
use crate::domain::diagnosis::Vital;
use crate::domain::foundation::{SessionId, UserId};

use super::dto::{
    ChatRequest, ChatResponse, ClearSessionResponse, ErrorResponse, OrchestratorRequest,
    SaveEventRequest, UserEventsResponse,
};

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub pipeline: Arc<RoutinePipeline>,
}

impl AppState {
    /// Creates the handler state.
    pub fn new(chat: Arc<ChatService>, pipeline: Arc<RoutinePipeline>) -> Self {
        Self { chat, pipeline }
    }
}

/// API-level failures mapped to HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream capability failed: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<ChatTurnError> for ApiError {
    fn from(error: ChatTurnError) -> Self {
        match error {
            ChatTurnError::Validation(e) => ApiError::BadRequest(e.to_string()),
            ChatTurnError::TurnTimeout { .. } => ApiError::Timeout,
            ChatTurnError::Generation(e) => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<RecordEventError> for ApiError {
    fn from(error: RecordEventError) -> Self {
        match error {
            RecordEventError::Validation(e) => ApiError::BadRequest(e.to_string()),
            RecordEventError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// GET / - service health probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "strand-concierge",
    }))
}

/// POST /api/chat - one diagnostic conversation turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id =
        SessionId::new(request.session_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user_id =
        UserId::new(request.user_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let response = state
        .chat
        .handle_turn(ChatTurnRequest {
            session_id,
            user_id,
            message: request.message,
        })
        .await?;

    Ok(Json(ChatResponse::from(response)))
}

/// POST /api/event - persist a finalized diagnostic event.
pub async fn save_event(
    State(state): State<AppState>,
    Json(request): Json<SaveEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id =
        SessionId::new(request.session_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user_id =
        UserId::new(request.user_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let target_vital = Vital::parse(&request.target_vital)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let saved = state
        .chat
        .record_event(RecordEventRequest {
            user_id,
            session_id,
            target_vital,
            vital_score: request.vital_value,
            summary: request.conversation_summary,
            keywords: request.keywords,
            wash_day_number: request.wash_day_number,
            day_in_cycle: request.day_in_cycle,
        })
        .await?;

    Ok(Json(saved))
}

/// GET /api/events/{user_id} - all events for a user.
pub async fn get_user_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = UserId::new(user_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let events = state
        .chat
        .events_for_user(&user)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(UserEventsResponse {
        user_id: user.to_string(),
        count: events.len(),
        events,
    }))
}

/// DELETE /api/session/{session_id} - discard a session's turn state.
pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = SessionId::new(session_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state
        .chat
        .clear_session(&session)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ClearSessionResponse {
        message: format!("Session {} cleared successfully", session),
    }))
}

/// POST /api/run-orchestrator - run the routine pipeline, streaming
/// newline-delimited JSON events as they are produced.
pub async fn run_orchestrator(
    State(state): State<AppState>,
    Json(request): Json<OrchestratorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = request
        .user_id
        .map(UserId::new)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let events = state.pipeline.run(PipelineRequest {
        answers: request.answers,
        user_id,
    });

    let body = Body::from_stream(events.map(|event| {
        let line = serde_json::to_string(&event).unwrap_or_else(|_| {
            r#"{"type":"error","content":{"message":"event serialization failed"}}"#.to_string()
        });
        Ok::<_, std::convert::Infallible>(format!("{line}\n"))
    }));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))?)
}
