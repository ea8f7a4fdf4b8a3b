//! In-memory event store for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::foundation::{SessionId, UserId};
use crate::ports::{DiagnosticEvent, EventStore, StoreError};

#[derive(Default)]
struct StoreState {
    events: HashMap<UserId, Vec<DiagnosticEvent>>,
    routines: HashMap<UserId, Vec<serde_json::Value>>,
}

/// Event store backed by process memory.
#[derive(Default)]
pub struct InMemoryEventStore {
    state: Mutex<StoreState>,
    unavailable: std::sync::atomic::AtomicBool,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as unavailable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_event(&self, event: DiagnosticEvent) -> Result<DiagnosticEvent, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state
            .events
            .entry(event.user_id.clone())
            .or_default()
            .push(event.clone());
        Ok(event)
    }

    async fn recent_events(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<DiagnosticEvent>, StoreError> {
        let mut events = self.events_by_user(user).await?;
        events.truncate(limit);
        Ok(events)
    }

    async fn events_by_user(&self, user: &UserId) -> Result<Vec<DiagnosticEvent>, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let mut events = state.events.get(user).cloned().unwrap_or_default();
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(events)
    }

    async fn save_routine(
        &self,
        user: &UserId,
        routine: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.routines.entry(user.clone()).or_default().push(routine);
        Ok(())
    }

    async fn active_routine(
        &self,
        user: &UserId,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .routines
            .get(user)
            .and_then(|routines| routines.last().cloned()))
    }

    // Turn state lives in the session cache; there is nothing extra to
    // discard here beyond confirming the store is reachable.
    async fn clear_session(&self, _session: &SessionId) -> Result<(), StoreError> {
        self.check_available()?;
        Ok(())
    }
}
