//! The relay loop: consumes inbound messages, routes them, generates replies
//! and publishes the outbound result.
//!
//! Every outcome — reply, policy block, not-ready model, transport failure,
//! bare trigger — turns into a user-visible message or a deliberate silence;
//! no per-message error ever stops the loop.

use crate::bus::MessageBus;
use crate::commands;
use crate::error::{GenerateError, Result};
use crate::events::{InboundMessage, MessageBody, MessageFormat, OutboundMessage};
use crate::responder::{Responder, ResponseOutcome};
use crate::router::{RouteDecision, Router};
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Apology when the model has not been configured.
const NOT_READY_APOLOGY: &str =
    "Sorry, the AI connection is having trouble right now (the model is not ready).";

/// Apology for transport and other unexpected generation failures.
const GENERIC_APOLOGY: &str =
    "Sorry, something went wrong while contacting the AI. Please try again later.";

/// Relay loop wiring the router, responder and session store to the bus.
///
/// Each inbound message is handled on its own task: a slow remote call in
/// one conversation never delays the others, and within one conversation the
/// session lock serializes racing messages.
#[derive(Clone)]
pub struct RelayLoop {
    bus: MessageBus,
    router: Router,
    responder: Arc<Responder>,
    store: Arc<SessionStore>,
    running: Arc<RwLock<bool>>,
}

impl std::fmt::Debug for RelayLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayLoop").finish_non_exhaustive()
    }
}

impl RelayLoop {
    /// Create a relay loop.
    #[must_use]
    pub fn new(
        bus: MessageBus,
        router: Router,
        responder: Arc<Responder>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            bus,
            router,
            responder,
            store,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run until [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; the signature leaves room for fatal
    /// bus conditions.
    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;
        info!("relay loop started");

        while *self.running.read().await {
            let Some(msg) = self
                .bus
                .consume_inbound_timeout(Duration::from_secs(1))
                .await
            else {
                continue;
            };
            let worker = self.clone();
            tokio::spawn(async move {
                worker.handle_message(&msg).await;
            });
        }

        info!("relay loop stopped");
        Ok(())
    }

    /// Stop the loop after the current message.
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    async fn handle_message(&self, msg: &InboundMessage) {
        let outbound = match &msg.body {
            MessageBody::Command(command) => {
                Some(commands::handle(*command, msg, &self.store, self.router.triggers()).await)
            }
            MessageBody::Text(_) => match self.router.route(msg) {
                RouteDecision::Ignore => {
                    debug!(chat = %msg.chat_id, "not responding");
                    None
                }
                RouteDecision::AskForQuery { trigger } => Some(OutboundMessage::reply_to(
                    msg,
                    format!("What would you like to ask? Send {trigger} followed by your question."),
                )),
                RouteDecision::Respond { query } => {
                    let outcome = self
                        .responder
                        .generate_response(&msg.session_key(), &query)
                        .await;
                    Some(outcome_reply(msg, outcome))
                }
            },
        };

        if let Some(outbound) = outbound {
            if let Err(e) = self.bus.publish_outbound(outbound).await {
                error!(chat = %msg.chat_id, error = %e, "failed to publish reply");
            }
        }
    }
}

/// Map a generation outcome to the outbound reply. Details were already
/// logged by the responder; here we only pick the user-facing text.
fn outcome_reply(msg: &InboundMessage, outcome: ResponseOutcome) -> OutboundMessage {
    match outcome {
        ResponseOutcome::Reply(text) => {
            OutboundMessage::reply_to(msg, text).with_format(MessageFormat::Markdown)
        }
        ResponseOutcome::Blocked(reason) => OutboundMessage::reply_to(
            msg,
            format!(
                "Sorry, your request could not be processed for safety reasons: {reason}. \
                 The chat history may be affected."
            ),
        ),
        ResponseOutcome::Failed(GenerateError::NotReady) => {
            OutboundMessage::reply_to(msg, NOT_READY_APOLOGY)
        }
        ResponseOutcome::Failed(_) => OutboundMessage::reply_to(msg, GENERIC_APOLOGY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BotCommand, ChatKind};
    use tokio::sync::mpsc;

    struct Harness {
        bus: MessageBus,
        relay: Arc<RelayLoop>,
        outbound_rx: mpsc::Receiver<OutboundMessage>,
    }

    async fn harness(triggers: Vec<String>) -> Harness {
        let bus = MessageBus::new();
        let outbound_rx = bus.subscribe_channel("test").await;
        let store = Arc::new(SessionStore::new(50));
        let responder = Arc::new(Responder::new(Arc::clone(&store)));
        let relay = Arc::new(RelayLoop::new(
            bus.clone(),
            Router::new("990", triggers),
            responder,
            store,
        ));
        let runner = Arc::clone(&relay);
        tokio::spawn(async move {
            let _ = runner.run().await;
        });
        Harness {
            bus,
            relay,
            outbound_rx,
        }
    }

    fn inbound_text(kind: ChatKind, text: &str) -> InboundMessage {
        InboundMessage::new("test", "42", "1001", kind, MessageBody::Text(text.into()))
    }

    async fn recv(harness: &mut Harness) -> OutboundMessage {
        tokio::time::timeout(Duration::from_secs(2), harness.outbound_rx.recv())
            .await
            .expect("no outbound message before timeout")
            .expect("outbound channel closed")
    }

    #[tokio::test]
    async fn test_private_message_without_model_gets_not_ready_apology() {
        let mut h = harness(vec!["/ai".into()]).await;
        h.bus
            .publish_inbound(inbound_text(ChatKind::Private, "hello"))
            .await
            .unwrap();

        let reply = recv(&mut h).await;
        assert_eq!(reply.text, NOT_READY_APOLOGY);
        assert_eq!(reply.format, MessageFormat::Plain);
        h.relay.stop().await;
    }

    #[tokio::test]
    async fn test_bare_trigger_prompts_for_input() {
        let mut h = harness(vec!["/ai".into()]).await;
        h.bus
            .publish_inbound(inbound_text(ChatKind::Group, "/ai"))
            .await
            .unwrap();

        let reply = recv(&mut h).await;
        assert!(reply.text.contains("/ai"));
        assert!(reply.text.contains("What would you like to ask?"));
        h.relay.stop().await;
    }

    #[tokio::test]
    async fn test_unaddressed_group_message_is_silent() {
        let mut h = harness(vec!["/ai".into()]).await;
        h.bus
            .publish_inbound(inbound_text(ChatKind::Group, "just chatting"))
            .await
            .unwrap();
        // A command afterwards still gets answered, proving the silent
        // message neither replied nor wedged the loop.
        h.bus
            .publish_inbound(InboundMessage::new(
                "test",
                "42",
                "1001",
                ChatKind::Group,
                MessageBody::Command(BotCommand::About),
            ))
            .await
            .unwrap();

        let reply = recv(&mut h).await;
        assert!(reply.text.contains("relay bot"));
        h.relay.stop().await;
    }

    #[tokio::test]
    async fn test_reset_command_round_trip() {
        let mut h = harness(vec!["/ai".into()]).await;
        h.bus
            .publish_inbound(InboundMessage::new(
                "test",
                "42",
                "1001",
                ChatKind::Private,
                MessageBody::Command(BotCommand::Reset),
            ))
            .await
            .unwrap();

        let reply = recv(&mut h).await;
        assert!(reply.text.contains("no conversation to reset"));
        h.relay.stop().await;
    }
}
