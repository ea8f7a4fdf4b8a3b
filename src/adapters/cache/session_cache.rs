//! In-process session cache for conversation state.
//!
//! Holds the rolling turn window and the memoized historical-context block
//! for each active session. Context fetches that fail are not cached, so the
//! next turn retries them; the caller still gets an empty block and the
//! conversation proceeds without history.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::diagnosis::Turn;
use crate::domain::foundation::SessionId;

/// Turns retained per session; older turns fall off the front.
pub const HISTORY_WINDOW: usize = 10;

#[derive(Default)]
struct SessionEntry {
    turns: Vec<Turn>,
    context: Option<String>,
}

/// Session-scoped conversation cache.
#[derive(Default)]
pub struct SessionCache {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the retained turn window for a session, oldest first.
    pub async fn history(&self, session: &SessionId) -> Vec<Turn> {
        self.sessions
            .lock()
            .await
            .get(session)
            .map(|entry| entry.turns.clone())
            .unwrap_or_default()
    }

    /// Appends one turn, evicting the oldest beyond the window.
    pub async fn append(&self, session: &SessionId, turn: Turn) {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(session.clone()).or_default();
        entry.turns.push(turn);
        if entry.turns.len() > HISTORY_WINDOW {
            let excess = entry.turns.len() - HISTORY_WINDOW;
            entry.turns.drain(..excess);
        }
    }

    /// Returns the memoized historical-context block, fetching it on first
    /// use. A failed fetch degrades to an empty block and is not memoized.
    pub async fn context_or_fetch<F, Fut, E>(&self, session: &SessionId, fetch: F) -> String
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        if let Some(context) = self
            .sessions
            .lock()
            .await
            .get(session)
            .and_then(|entry| entry.context.clone())
        {
            return context;
        }

        // Lock released across the fetch.
        match fetch().await {
            Ok(context) => {
                self.sessions
                    .lock()
                    .await
                    .entry(session.clone())
                    .or_default()
                    .context = Some(context.clone());
                context
            }
            Err(error) => {
                warn!(session = %session, error = %error, "historical context fetch failed");
                String::new()
            }
        }
    }

    /// Discards all state for a session. Idempotent.
    pub async fn clear(&self, session: &SessionId) {
        self.sessions.lock().await.remove(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn session(key: &str) -> SessionId {
        SessionId::new(key).unwrap()
    }

    #[tokio::test]
    async fn history_starts_empty_and_preserves_order() {
        let cache = SessionCache::new();
        let s = session("s-1");
        assert!(cache.history(&s).await.is_empty());

        cache.append(&s, Turn::user("my hair feels like straw")).await;
        cache.append(&s, Turn::assistant("When did this start?")).await;

        let history = cache.history(&s).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "my hair feels like straw");
        assert_eq!(history[1].text, "When did this start?");
    }

    #[tokio::test]
    async fn window_evicts_oldest_turns() {
        let cache = SessionCache::new();
        let s = session("s-1");
        for i in 0..HISTORY_WINDOW + 3 {
            cache.append(&s, Turn::user(format!("turn {i}"))).await;
        }

        let history = cache.history(&s).await;
        assert_eq!(history.len(), HISTORY_WINDOW);
        assert_eq!(history[0].text, "turn 3");
        assert_eq!(history.last().unwrap().text, format!("turn {}", HISTORY_WINDOW + 2));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let cache = SessionCache::new();
        cache.append(&session("a"), Turn::user("hello")).await;
        assert!(cache.history(&session("b")).await.is_empty());
    }

    #[tokio::test]
    async fn context_is_fetched_once_then_memoized() {
        let cache = SessionCache::new();
        let s = session("s-1");

        let first = cache
            .context_or_fetch(&s, || async {
                Ok::<_, Infallible>("- 2 days ago: breakage".to_string())
            })
            .await;
        assert_eq!(first, "- 2 days ago: breakage");

        // Second call must not invoke the fetch again.
        let second = cache
            .context_or_fetch(&s, || async {
                panic!("context was not memoized");
                #[allow(unreachable_code)]
                Ok::<_, Infallible>(String::new())
            })
            .await;
        assert_eq!(second, "- 2 days ago: breakage");
    }

    #[tokio::test]
    async fn failed_fetch_degrades_to_empty_and_is_retried() {
        let cache = SessionCache::new();
        let s = session("s-1");

        let degraded = cache
            .context_or_fetch(&s, || async { Err::<String, _>("store down") })
            .await;
        assert_eq!(degraded, "");

        let recovered = cache
            .context_or_fetch(&s, || async { Ok::<_, Infallible>("back".to_string()) })
            .await;
        assert_eq!(recovered, "back");
    }

    #[tokio::test]
    async fn clear_discards_turns_and_context_and_is_idempotent() {
        let cache = SessionCache::new();
        let s = session("s-1");
        cache.append(&s, Turn::user("hi")).await;
        cache
            .context_or_fetch(&s, || async { Ok::<_, Infallible>("ctx".to_string()) })
            .await;

        cache.clear(&s).await;
        cache.clear(&s).await;

        assert!(cache.history(&s).await.is_empty());
        let refetched = cache
            .context_or_fetch(&s, || async { Ok::<_, Infallible>("fresh".to_string()) })
            .await;
        assert_eq!(refetched, "fresh");
    }
}
