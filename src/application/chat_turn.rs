//! Chat turn use case - the full request path for one diagnostic exchange.
//!
//! Orchestrates the session cache, historical-context fetch, guarded agent
//! call, checkpoint extraction, and the best-effort auto-summarization that
//! follows a handoff. Also owns event recording, which finalizes a session.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::cache::SessionCache;
use crate::application::diagnose::DiagnosticAgent;
use crate::application::summarize::Summarizer;
use crate::domain::diagnosis::{checkpoint, Turn, Vital};
use crate::domain::foundation::{EventId, SessionId, UserId, ValidationError};
use crate::ports::{format_prompt_context, DiagnosticEvent, EventStore, GenerationError, StoreError};

/// Past events pulled into the prompt as historical context.
const CONTEXT_EVENT_LIMIT: usize = 5;

/// One inbound chat message.
#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub message: String,
}

/// The assistant's reply plus handoff metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurnResponse {
    /// Checkpoint-free assistant text.
    pub message: String,
    /// True when this turn finalized a diagnosis.
    pub handoff: bool,
    pub target_vital: Option<Vital>,
    pub session_id: SessionId,
    /// Auto-summary, present only on a handoff where summarization
    /// succeeded in time.
    pub summary: Option<String>,
    pub keywords: Vec<String>,
}

/// Failures of one chat turn.
#[derive(Debug, Error)]
pub enum ChatTurnError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("turn timed out after {timeout_secs}s")]
    TurnTimeout { timeout_secs: u64 },

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Request to persist a finalized diagnostic event.
#[derive(Debug, Clone)]
pub struct RecordEventRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub target_vital: Vital,
    /// 1-10 severity from the post-diagnosis slider.
    pub vital_score: Option<u8>,
    pub summary: String,
    pub keywords: Vec<String>,
    pub wash_day_number: Option<u32>,
    pub day_in_cycle: Option<u32>,
}

/// Failures of event recording.
#[derive(Debug, Error)]
pub enum RecordEventError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The diagnostic conversation service.
pub struct ChatService {
    agent: DiagnosticAgent,
    summarizer: Summarizer,
    cache: Arc<SessionCache>,
    store: Arc<dyn EventStore>,
    turn_timeout: Duration,
    summary_timeout: Duration,
}

impl ChatService {
    /// Creates a service with production timeouts.
    pub fn new(
        agent: DiagnosticAgent,
        summarizer: Summarizer,
        cache: Arc<SessionCache>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            agent,
            summarizer,
            cache,
            store,
            turn_timeout: Duration::from_secs(45),
            summary_timeout: Duration::from_secs(10),
        }
    }

    /// Overrides the overall per-turn deadline.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Overrides the auto-summarization deadline.
    pub fn with_summary_timeout(mut self, timeout: Duration) -> Self {
        self.summary_timeout = timeout;
        self
    }

    /// Handles one chat turn end to end.
    pub async fn handle_turn(
        &self,
        request: ChatTurnRequest,
    ) -> Result<ChatTurnResponse, ChatTurnError> {
        if request.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let history = self.cache.history(&request.session_id).await;
        self.cache
            .append(&request.session_id, Turn::user(request.message.clone()))
            .await;

        let store = Arc::clone(&self.store);
        let user = request.user_id.clone();
        let context = self
            .cache
            .context_or_fetch(&request.session_id, || async move {
                store
                    .recent_events(&user, CONTEXT_EVENT_LIMIT)
                    .await
                    .map(|events| format_prompt_context(&events))
            })
            .await;

        let raw = tokio::time::timeout(
            self.turn_timeout,
            self.agent.run_turn(&history, &request.message, &context),
        )
        .await
        .map_err(|_| ChatTurnError::TurnTimeout {
            timeout_secs: self.turn_timeout.as_secs(),
        })??;

        let extraction = checkpoint::extract(&raw);
        let handoff = extraction.vital.is_some();

        let mut summary = None;
        let mut keywords = Vec::new();
        if handoff {
            info!(session = %request.session_id, vital = ?extraction.vital, "diagnosis finalized");
            let mut full_context = history.clone();
            full_context.push(Turn::user(request.message.clone()));
            full_context.push(Turn::assistant(extraction.clean_text.clone()));

            match tokio::time::timeout(
                self.summary_timeout,
                self.summarizer.summarize(&full_context),
            )
            .await
            {
                Ok(Ok(report)) => {
                    summary = Some(report.summary);
                    keywords = report.keywords;
                }
                Ok(Err(error)) => {
                    warn!(session = %request.session_id, error = %error, "auto-summary failed");
                }
                Err(_) => {
                    warn!(session = %request.session_id, "auto-summary timed out");
                }
            }
        }

        self.cache
            .append(
                &request.session_id,
                Turn::assistant(extraction.clean_text.clone()),
            )
            .await;

        Ok(ChatTurnResponse {
            message: extraction.clean_text,
            handoff,
            target_vital: extraction.vital,
            session_id: request.session_id,
            summary,
            keywords,
        })
    }

    /// Persists a finalized diagnostic event and tears the session down.
    pub async fn record_event(
        &self,
        request: RecordEventRequest,
    ) -> Result<DiagnosticEvent, RecordEventError> {
        if let Some(score) = request.vital_score {
            if !(1..=10).contains(&score) {
                return Err(ValidationError::ScoreOutOfRange(score).into());
            }
        }

        let event = DiagnosticEvent {
            id: EventId::new(),
            user_id: request.user_id,
            session_id: request.session_id.clone(),
            vital: request.target_vital,
            vital_score: request.vital_score,
            summary: request.summary,
            keywords: request.keywords,
            wash_day_number: request.wash_day_number,
            day_in_cycle: request.day_in_cycle,
            recorded_at: Utc::now(),
        };

        let saved = self.store.save_event(event).await?;

        // The conversation is captured in the event; session state can go.
        self.cache.clear(&request.session_id).await;
        if let Err(error) = self.store.clear_session(&request.session_id).await {
            warn!(session = %request.session_id, error = %error, "session cleanup failed");
        }

        Ok(saved)
    }

    /// All recorded events for a user, newest first.
    pub async fn events_for_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<DiagnosticEvent>, StoreError> {
        self.store.events_by_user(user).await
    }

    /// Clears one session's cached and persisted turn state.
    pub async fn clear_session(&self, session: &SessionId) -> Result<(), StoreError> {
        self.cache.clear(session).await;
        self.store.clear_session(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{CompletionClient, ScriptedBackend};
    use crate::adapters::store::InMemoryEventStore;
    use crate::ports::{Fragment, FragmentStream, GenerationBackend, GenerationOptions, UnitUsage};
    use async_trait::async_trait;

    fn service(backend: Arc<ScriptedBackend>) -> (ChatService, Arc<InMemoryEventStore>) {
        let client = Arc::new(CompletionClient::new(backend));
        let store = Arc::new(InMemoryEventStore::new());
        let service = ChatService::new(
            DiagnosticAgent::new(Arc::clone(&client)),
            Summarizer::new(client),
            Arc::new(SessionCache::new()),
            Arc::clone(&store) as Arc<dyn EventStore>,
        );
        (service, store)
    }

    fn request(message: &str) -> ChatTurnRequest {
        ChatTurnRequest {
            session_id: SessionId::new("s-1").unwrap(),
            user_id: UserId::new("u-1").unwrap(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn straw_to_breakage_conversation_runs_to_handoff() {
        let backend = Arc::new(ScriptedBackend::new());
        let (service, _) = service(Arc::clone(&backend));

        // Turn 1: acknowledge and narrow.
        backend.push_text(
            "That sounds frustrating. Is it snapping when you touch it, or just feeling rough?",
            UnitUsage::new(200, 25),
        );
        let reply = service
            .handle_turn(request("My hair feels like straw"))
            .await
            .unwrap();
        assert!(!reply.handoff);
        assert_eq!(reply.message.matches('?').count(), 1);
        assert!(backend.prompt(0).contains("(No previous messages)"));

        // Turn 2: timeline question; the timeline is still unknown when
        // this prompt is built.
        backend.push_text(
            "Got it, snapping points to weakness. What day are you on in your wash cycle?",
            UnitUsage::new(240, 30),
        );
        let reply = service
            .handle_turn(request("Snapping when I brush it"))
            .await
            .unwrap();
        assert!(!reply.handoff);
        assert!(backend.prompt(1).contains("Wash-cycle timeline known: no"));

        // Turn 3: verification summary, no checkpoint yet. The timeline
        // marker from turn 2's reply is now in the considered history.
        backend.push_text(
            "So your hair is snapping when brushed on day 5 of your cycle. Does that sound right?",
            UnitUsage::new(280, 35),
        );
        let reply = service.handle_turn(request("Day 5")).await.unwrap();
        assert!(!reply.handoff);
        assert!(reply.target_vital.is_none());
        assert!(backend.prompt(2).contains("Wash-cycle timeline known: yes"));

        // Turn 4: confirmation triggers the checkpoint, then the
        // summarizer consumes one more scripted completion.
        backend.push_text(
            "Thank you for confirming. Let's get that breakage under control. [CHECKPOINT: BREAKAGE]",
            UnitUsage::new(320, 40),
        );
        backend.push_text(
            "SUMMARY: High breakage on day 5, worst when brushing dry.\nKEYWORDS: mechanical damage, low elasticity",
            UnitUsage::new(150, 30),
        );
        let reply = service.handle_turn(request("Yes exactly")).await.unwrap();

        assert!(reply.handoff);
        assert_eq!(reply.target_vital, Some(Vital::Breakage));
        assert!(!reply.message.contains("[CHECKPOINT"));
        assert!(reply.summary.as_deref().unwrap().contains("day 5"));
        assert_eq!(reply.keywords, vec!["mechanical damage", "low elasticity"]);
    }

    #[tokio::test]
    async fn failed_summarizer_does_not_fail_the_turn() {
        let backend = Arc::new(ScriptedBackend::new());
        let (service, _) = service(Arc::clone(&backend));

        backend.push_text(
            "All set, this is definitely dryness. [CHECKPOINT: MOISTURE]",
            UnitUsage::default(),
        );
        backend.push_failure(GenerationError::network("summarizer down"));

        let reply = service.handle_turn(request("yes that is right")).await.unwrap();
        assert!(reply.handoff);
        assert_eq!(reply.target_vital, Some(Vital::Moisture));
        assert!(reply.summary.is_none());
        assert!(reply.keywords.is_empty());
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_any_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let (service, _) = service(Arc::clone(&backend));

        let err = service.handle_turn(request("   ")).await.unwrap_err();
        assert!(matches!(err, ChatTurnError::Validation(_)));
        assert!(backend.calls().is_empty());
    }

    struct HangingBackend;

    #[async_trait]
    impl GenerationBackend for HangingBackend {
        async fn invoke(
            &self,
            _prompt: &str,
            _model: &str,
            _options: GenerationOptions,
        ) -> Result<FragmentStream, GenerationError> {
            Ok(Box::pin(futures::stream::pending()))
        }
    }

    #[tokio::test]
    async fn slow_turn_times_out_with_a_distinct_error() {
        let client = Arc::new(CompletionClient::new(Arc::new(HangingBackend)));
        let store = Arc::new(InMemoryEventStore::new());
        let service = ChatService::new(
            DiagnosticAgent::new(Arc::clone(&client)),
            Summarizer::new(client),
            Arc::new(SessionCache::new()),
            store,
        )
        .with_turn_timeout(Duration::from_millis(20));

        let err = service.handle_turn(request("hello")).await.unwrap_err();
        assert!(matches!(err, ChatTurnError::TurnTimeout { .. }));
    }

    #[tokio::test]
    async fn recording_an_event_clears_the_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let (service, store) = service(Arc::clone(&backend));
        let session = SessionId::new("s-1").unwrap();
        let user = UserId::new("u-1").unwrap();

        backend.push_text("Is it dry, or just messy?", UnitUsage::default());
        service.handle_turn(request("my hair is weird")).await.unwrap();

        let saved = service
            .record_event(RecordEventRequest {
                user_id: user.clone(),
                session_id: session.clone(),
                target_vital: Vital::Breakage,
                vital_score: Some(7),
                summary: "High breakage on day 5.".into(),
                keywords: vec!["mechanical damage".into()],
                wash_day_number: Some(5),
                day_in_cycle: Some(5),
            })
            .await
            .unwrap();

        assert_eq!(saved.vital, Vital::Breakage);
        assert_eq!(store.events_by_user(&user).await.unwrap().len(), 1);
        assert!(service.cache.history(&session).await.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new());
        let (service, store) = service(backend);

        let err = service
            .record_event(RecordEventRequest {
                user_id: UserId::new("u-1").unwrap(),
                session_id: SessionId::new("s-1").unwrap(),
                target_vital: Vital::Scalp,
                vital_score: Some(11),
                summary: "itchy".into(),
                keywords: vec![],
                wash_day_number: None,
                day_in_cycle: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RecordEventError::Validation(_)));
        assert!(store
            .events_by_user(&UserId::new("u-1").unwrap())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn context_fetch_failure_degrades_to_empty_prompt_context() {
        let backend = Arc::new(ScriptedBackend::new());
        let client = Arc::new(CompletionClient::new(
            Arc::clone(&backend) as Arc<dyn GenerationBackend>
        ));
        let store = Arc::new(InMemoryEventStore::new());
        store.set_unavailable(true);
        let service = ChatService::new(
            DiagnosticAgent::new(Arc::clone(&client)),
            Summarizer::new(client),
            Arc::new(SessionCache::new()),
            Arc::clone(&store) as Arc<dyn EventStore>,
        );

        backend.push_text("Is it dry, or just messy?", UnitUsage::default());
        let reply = service.handle_turn(request("my hair is odd")).await.unwrap();
        assert!(!reply.handoff);
        assert!(!backend.prompt(0).contains("PAST DIAGNOSTIC HISTORY"));
    }
}
