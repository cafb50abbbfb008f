//! In-memory dialogue sessions, one per conversation.
//!
//! The [`SessionStore`] is the only component that creates or destroys
//! sessions: at most one [`DialogueSession`] exists per conversation key at
//! any time. Handles are `Arc<Mutex<_>>` so the generation path can hold a
//! conversation's lock across the remote call — two messages racing in the
//! same conversation serialize, while other conversations proceed untouched.
//!
//! Sessions are deliberately not persisted; a restart forgets everything.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::util::timestamp_ms;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The generative model's side.
    Model,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A single turn of dialogue history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Turn author.
    pub role: Role,
    /// Turn text.
    pub text: String,
    /// Record timestamp (Unix milliseconds).
    pub timestamp: u64,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: timestamp_ms(),
        }
    }
}

/// Accumulated dialogue context for one conversation.
#[derive(Debug)]
pub struct DialogueSession {
    turns: Vec<Turn>,
    max_turns: usize,
    created_at: u64,
    updated_at: u64,
}

impl DialogueSession {
    fn new(max_turns: usize) -> Self {
        let now = timestamp_ms();
        Self {
            turns: Vec::new(),
            max_turns,
            created_at: now,
            updated_at: now,
        }
    }

    /// The recorded turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Creation timestamp (Unix milliseconds).
    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Record a user turn.
    pub fn record_user(&mut self, text: impl Into<String>) {
        self.record(Turn::new(Role::User, text));
    }

    /// Record a model turn.
    pub fn record_model(&mut self, text: impl Into<String>) {
        self.record(Turn::new(Role::Model, text));
    }

    fn record(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.updated_at = timestamp_ms();

        // Sliding window: drop the oldest turns past the cap. 0 disables it.
        if self.max_turns > 0 && self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(0..excess);
        }
    }
}

/// Shared handle to one conversation's session.
pub type SessionHandle = Arc<Mutex<DialogueSession>>;

/// Store mapping conversation keys to dialogue sessions.
///
/// Sessions live until [`reset`](Self::reset) or
/// [`invalidate_all`](Self::invalidate_all); there is no implicit expiry.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    max_turns: usize,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("max_turns", &self.max_turns)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store whose sessions keep at most `max_turns` turns each
    /// (0 = unbounded).
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }

    /// Return the session for `key`, creating an empty one if absent.
    pub async fn get_or_create(&self, key: &str) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(key) {
            return Arc::clone(existing);
        }
        debug!(conversation = %key, "creating new dialogue session");
        let handle = Arc::new(Mutex::new(DialogueSession::new(self.max_turns)));
        sessions.insert(key.to_string(), Arc::clone(&handle));
        handle
    }

    /// Remove the session for `key`. Returns whether one existed.
    pub async fn reset(&self, key: &str) -> bool {
        let removed = self.sessions.write().await.remove(key).is_some();
        if removed {
            info!(conversation = %key, "dialogue session reset");
        } else {
            debug!(conversation = %key, "no dialogue session to reset");
        }
        removed
    }

    /// Drop every session. Used when the model is reconfigured: contexts
    /// bound to a stale configuration are no longer valid.
    pub async fn invalidate_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        if count > 0 {
            info!(count, "invalidated all dialogue sessions");
        }
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_starts_empty() {
        let store = SessionStore::new(50);
        let session = store.get_or_create("telegram:1").await;
        assert!(session.lock().await.is_empty());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let store = SessionStore::new(50);
        let first = store.get_or_create("telegram:1").await;
        first.lock().await.record_user("hello");

        let second = store.get_or_create("telegram:1").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_reports_whether_session_existed() {
        let store = SessionStore::new(50);
        assert!(!store.reset("telegram:1").await);

        store.get_or_create("telegram:1").await;
        assert!(store.reset("telegram:1").await);

        // A later lookup starts fresh.
        let fresh = store.get_or_create("telegram:1").await;
        assert!(fresh.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_all_forgets_prior_context() {
        let store = SessionStore::new(50);
        let session = store.get_or_create("telegram:1").await;
        session.lock().await.record_user("remember me");
        store.get_or_create("telegram:2").await;

        store.invalidate_all().await;
        assert_eq!(store.count().await, 0);

        let reborn = store.get_or_create("telegram:1").await;
        assert!(reborn.lock().await.is_empty());
        assert!(!Arc::ptr_eq(&session, &reborn));
    }

    #[tokio::test]
    async fn test_sessions_are_independent_per_conversation() {
        let store = SessionStore::new(50);
        let a = store.get_or_create("telegram:1").await;
        let b = store.get_or_create("telegram:2").await;
        a.lock().await.record_user("only in a");

        assert_eq!(a.lock().await.len(), 1);
        assert!(b.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_history_window_trims_oldest() {
        let store = SessionStore::new(3);
        let session = store.get_or_create("telegram:1").await;
        let mut session = session.lock().await;

        session.record_user("1");
        session.record_model("2");
        session.record_user("3");
        session.record_model("4");

        assert_eq!(session.len(), 3);
        assert_eq!(session.turns()[0].text, "2");
        assert_eq!(session.turns()[2].text, "4");
    }

    #[tokio::test]
    async fn test_zero_cap_means_unbounded() {
        let store = SessionStore::new(0);
        let session = store.get_or_create("telegram:1").await;
        let mut session = session.lock().await;
        for i in 0..100 {
            session.record_user(format!("{i}"));
        }
        assert_eq!(session.len(), 100);
    }
}
