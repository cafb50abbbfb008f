//! The response client: forwards a query with its conversation context to
//! Gemini and interprets the result.
//!
//! Owns an optional client handle (typed not-ready instead of a nullable
//! global) and the session store. Every failure mode is folded into
//! [`ResponseOutcome`]; nothing escapes this component.

use crate::config::GeminiConfig;
use crate::error::{ConfigResult, GenerateError};
use crate::gemini::{Content, GeminiClient, Reply};
use crate::session::{Role, SessionStore, Turn};
use crate::util::truncate_str;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Outcome of one generation request.
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    /// The model replied with text.
    Reply(String),
    /// The service refused for a policy reason; carries the reason code.
    Blocked(String),
    /// The call failed; the conversation history did not advance.
    Failed(GenerateError),
}

/// Generates replies for conversations, maintaining per-conversation context.
pub struct Responder {
    client: RwLock<Option<GeminiClient>>,
    store: Arc<SessionStore>,
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder").finish_non_exhaustive()
    }
}

impl Responder {
    /// Create a responder over the given session store. The responder starts
    /// unconfigured: every request yields `Failed(NotReady)` until
    /// [`configure`](Self::configure) succeeds.
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            client: RwLock::new(None),
            store,
        }
    }

    /// (Re)configure the model client.
    ///
    /// On success the new client replaces the old one; on failure the handle
    /// is cleared so callers get a typed not-ready instead of talking to a
    /// half-configured model. Either way every existing session is dropped:
    /// contexts recorded against the previous configuration are stale.
    ///
    /// # Errors
    ///
    /// Configuration errors from the client builder (missing key or model).
    pub async fn configure(&self, config: &GeminiConfig) -> ConfigResult<()> {
        let mut builder = GeminiClient::builder().model(&config.model);
        if let Some(key) = config.resolved_api_key() {
            builder = builder.api_key(key);
        }
        if let Some(prompt) = &config.system_prompt {
            builder = builder.system_instruction(prompt);
        }
        if let Some(base_url) = &config.base_url {
            builder = builder.base_url(base_url);
        }
        builder = builder.timeout_secs(config.timeout_secs);

        match builder.build() {
            Ok(client) => {
                info!(model = %client.model(), "Gemini model configured");
                *self.client.write().await = Some(client);
                self.store.invalidate_all().await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to configure Gemini model");
                *self.client.write().await = None;
                self.store.invalidate_all().await;
                Err(e)
            }
        }
    }

    /// Whether a model client is currently configured.
    pub async fn is_ready(&self) -> bool {
        self.client.read().await.is_some()
    }

    /// Generate a reply for `query` in the given conversation.
    ///
    /// This is the only place sessions are created. The conversation's lock
    /// is held across the remote call, so concurrent messages within one
    /// conversation serialize while other conversations proceed.
    ///
    /// History bookkeeping follows the outcome: a reply records the user and
    /// model turns, a block records the user turn only (no rollback on
    /// block), and a failure records nothing.
    pub async fn generate_response(&self, conversation: &str, query: &str) -> ResponseOutcome {
        let client = self.client.read().await.clone();
        let Some(client) = client else {
            error!(conversation, "generation requested before model was configured");
            return ResponseOutcome::Failed(GenerateError::NotReady);
        };

        let session = self.store.get_or_create(conversation).await;
        let mut session = session.lock().await;

        debug!(
            conversation,
            turns = session.len(),
            query = %truncate_str(query, 100),
            "forwarding query to Gemini"
        );

        let mut contents: Vec<Content> = session.turns().iter().map(content_from_turn).collect();
        contents.push(Content::user(query));

        match client.generate(contents).await {
            Ok(response) => match response.into_reply() {
                Ok(Reply::Text(text)) => {
                    session.record_user(query);
                    session.record_model(&text);
                    debug!(
                        conversation,
                        reply = %truncate_str(&text, 100),
                        "received Gemini reply"
                    );
                    ResponseOutcome::Reply(text)
                }
                Ok(Reply::Blocked(reason)) => {
                    warn!(conversation, %reason, "request blocked by Gemini");
                    session.record_user(query);
                    ResponseOutcome::Blocked(reason)
                }
                Err(e) => {
                    error!(conversation, error = %e, "unusable Gemini response");
                    ResponseOutcome::Failed(e)
                }
            },
            Err(e) => {
                error!(conversation, error = %e, "Gemini call failed");
                ResponseOutcome::Failed(e)
            }
        }
    }
}

fn content_from_turn(turn: &Turn) -> Content {
    match turn.role {
        Role::User => Content::user(&turn.text),
        Role::Model => Content::model(&turn.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    fn store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(50))
    }

    #[tokio::test]
    async fn test_unconfigured_responder_reports_not_ready() {
        let store = store();
        let responder = Responder::new(Arc::clone(&store));

        let outcome = responder.generate_response("telegram:1", "hello").await;
        assert!(matches!(
            outcome,
            ResponseOutcome::Failed(GenerateError::NotReady)
        ));
        // The ready check fires before any session is touched.
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_configure_invalidates_existing_sessions() {
        let store = store();
        let responder = Responder::new(Arc::clone(&store));
        store.get_or_create("telegram:1").await;

        let config = GeminiConfig {
            api_key: Some("test-key".into()),
            ..GeminiConfig::default()
        };
        responder.configure(&config).await.unwrap();

        assert!(responder.is_ready().await);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_configure_clears_the_client() {
        let store = store();
        let responder = Responder::new(Arc::clone(&store));

        let good = GeminiConfig {
            api_key: Some("test-key".into()),
            ..GeminiConfig::default()
        };
        responder.configure(&good).await.unwrap();
        assert!(responder.is_ready().await);
        store.get_or_create("telegram:1").await;

        // Reconfiguration with no key anywhere must fail closed.
        let bad = GeminiConfig {
            api_key: Some(String::new()),
            model: String::new(),
            ..GeminiConfig::default()
        };
        assert!(responder.configure(&bad).await.is_err());
        assert!(!responder.is_ready().await);
        assert_eq!(store.count().await, 0);

        let outcome = responder.generate_response("telegram:1", "hello").await;
        assert!(matches!(
            outcome,
            ResponseOutcome::Failed(GenerateError::NotReady)
        ));
    }
}
