//! Application layer - use cases composing the domain with the ports.

pub mod chat_turn;
pub mod diagnose;
pub mod pipeline;
pub mod summarize;

pub use chat_turn::{
    ChatService, ChatTurnError, ChatTurnRequest, ChatTurnResponse, RecordEventError,
    RecordEventRequest,
};
pub use diagnose::DiagnosticAgent;
pub use pipeline::{
    EnrichedStep, ErrorDetail, PipelineEvent, PipelineRequest, RoutinePipeline, UsageSummary,
};
pub use summarize::{DiagnosticSummary, Summarizer};
