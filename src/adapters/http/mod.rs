//! HTTP adapter - the REST and streaming surface of the service.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ChatRequest, ChatResponse, ErrorResponse, OrchestratorRequest, SaveEventRequest};
pub use handlers::{ApiError, AppState};
pub use routes::{api_routes, app_router};
