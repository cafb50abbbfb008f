//! Decides whether an inbound message is addressed to the bot and what part
//! of it is the actual query.
//!
//! Private chats always get a reply. In group chats the only two consent
//! signals are a direct reply to one of the bot's own messages, or a message
//! leading with a configured trigger string; everything else stays silent so
//! the bot does not answer every line of a busy group.

use crate::events::{ChatKind, InboundMessage};
use tracing::debug;

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Forward `query` to the model and reply with the result.
    Respond {
        /// The effective query text (never empty).
        query: String,
    },
    /// A trigger was used with nothing after it: ask the user what they want,
    /// naming the trigger, and do not call the model.
    AskForQuery {
        /// The trigger the user invoked.
        trigger: String,
    },
    /// Say nothing.
    Ignore,
}

/// Message router for one bot identity.
#[derive(Debug, Clone)]
pub struct Router {
    bot_id: String,
    triggers: Vec<String>,
}

impl Router {
    /// Create a router for the bot with platform id `bot_id`, answering to
    /// the given trigger prefixes in group chats.
    pub fn new(bot_id: impl Into<String>, triggers: Vec<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            triggers,
        }
    }

    /// The configured trigger prefixes, in match order.
    #[must_use]
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// Route an inbound message.
    ///
    /// Rules, in order: non-text or blank messages are ignored; private chats
    /// get the full text; group replies aimed at the bot get the full text;
    /// otherwise triggers are scanned in configured order and the first one
    /// matching the message prefix (case-insensitively, followed by
    /// whitespace or end of message) wins.
    pub fn route(&self, msg: &InboundMessage) -> RouteDecision {
        let Some(text) = msg.text() else {
            return RouteDecision::Ignore;
        };
        if text.trim().is_empty() {
            debug!(chat = %msg.chat_id, "ignoring empty message");
            return RouteDecision::Ignore;
        }

        match msg.chat_kind {
            ChatKind::Private => RouteDecision::Respond {
                query: text.to_string(),
            },
            ChatKind::Group => {
                if self.is_reply_to_self(msg) {
                    return RouteDecision::Respond {
                        query: text.to_string(),
                    };
                }
                self.match_triggers(text)
            }
        }
    }

    /// Whether the message replies to one of the bot's own messages.
    fn is_reply_to_self(&self, msg: &InboundMessage) -> bool {
        msg.reply_to
            .as_ref()
            .and_then(|r| r.sender_id.as_deref())
            .is_some_and(|sender| sender == self.bot_id)
    }

    /// Scan the triggers in configured order; the first match wins.
    fn match_triggers(&self, text: &str) -> RouteDecision {
        for trigger in &self.triggers {
            let Some(rest) = strip_prefix_ignore_case(text, trigger) else {
                continue;
            };
            if rest.is_empty() {
                return RouteDecision::AskForQuery {
                    trigger: trigger.clone(),
                };
            }
            if rest.starts_with(char::is_whitespace) {
                let query = rest.trim();
                if query.is_empty() {
                    return RouteDecision::AskForQuery {
                        trigger: trigger.clone(),
                    };
                }
                return RouteDecision::Respond {
                    query: query.to_string(),
                };
            }
            // Prefix ran into more word characters ("aiport" for trigger
            // "ai"); this trigger does not match, but a later one still may.
        }
        RouteDecision::Ignore
    }
}

/// Strip `prefix` from the start of `text`, comparing case-insensitively.
/// Returns the remainder on a match.
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.chars();
    let mut matched = 0;
    for expected in prefix.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        matched += actual.len_utf8();
    }
    Some(&text[matched..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MessageBody, ReplyRef};

    fn router() -> Router {
        Router::new("990", vec!["/ai".to_string(), "bot,".to_string()])
    }

    fn group_text(text: &str) -> InboundMessage {
        InboundMessage::new(
            "telegram",
            "42",
            "1001",
            ChatKind::Group,
            MessageBody::Text(text.into()),
        )
    }

    fn private_text(text: &str) -> InboundMessage {
        InboundMessage::new(
            "telegram",
            "42",
            "55",
            ChatKind::Private,
            MessageBody::Text(text.into()),
        )
    }

    #[test]
    fn test_private_chat_gets_full_text() {
        assert_eq!(
            router().route(&private_text("hello")),
            RouteDecision::Respond {
                query: "hello".into()
            }
        );
    }

    #[test]
    fn test_blank_message_is_ignored() {
        assert_eq!(router().route(&private_text("   ")), RouteDecision::Ignore);
        assert_eq!(router().route(&group_text("")), RouteDecision::Ignore);
    }

    #[test]
    fn test_group_without_trigger_is_ignored() {
        assert_eq!(
            router().route(&group_text("what time is it")),
            RouteDecision::Ignore
        );
    }

    #[test]
    fn test_group_trigger_with_query() {
        assert_eq!(
            router().route(&group_text("/ai what time is it")),
            RouteDecision::Respond {
                query: "what time is it".into()
            }
        );
    }

    #[test]
    fn test_group_bare_trigger_asks_for_query() {
        assert_eq!(
            router().route(&group_text("/ai")),
            RouteDecision::AskForQuery {
                trigger: "/ai".into()
            }
        );
        // Trailing whitespace only is the same situation.
        assert_eq!(
            router().route(&group_text("/ai   ")),
            RouteDecision::AskForQuery {
                trigger: "/ai".into()
            }
        );
    }

    #[test]
    fn test_trigger_requires_word_boundary() {
        // "/aircraft" must not match the "/ai" trigger.
        assert_eq!(
            router().route(&group_text("/aircraft carriers")),
            RouteDecision::Ignore
        );
    }

    #[test]
    fn test_trigger_match_is_case_insensitive() {
        assert_eq!(
            router().route(&group_text("/AI hello")),
            RouteDecision::Respond {
                query: "hello".into()
            }
        );
    }

    #[test]
    fn test_first_configured_trigger_wins() {
        let router = Router::new("990", vec!["/ai".into(), "/ai-long".into()]);
        // "/ai-long" never gets a chance: "/ai" is checked first and does not
        // match here (no whitespace after it), so the scan continues and the
        // second trigger matches.
        assert_eq!(
            router.route(&group_text("/ai-long question")),
            RouteDecision::Respond {
                query: "question".into()
            }
        );
        // When both could match, the earlier one is taken.
        let router = Router::new("990", vec!["bot".into(), "bot,".into()]);
        assert_eq!(
            router.route(&group_text("bot tell me")),
            RouteDecision::Respond {
                query: "tell me".into()
            }
        );
    }

    #[test]
    fn test_reply_to_bot_bypasses_triggers() {
        let msg = group_text("no trigger here at all").with_reply_to(ReplyRef {
            message_id: "777".into(),
            sender_id: Some("990".into()),
        });
        assert_eq!(
            router().route(&msg),
            RouteDecision::Respond {
                query: "no trigger here at all".into()
            }
        );
    }

    #[test]
    fn test_reply_to_someone_else_is_ignored() {
        let msg = group_text("talking to a human").with_reply_to(ReplyRef {
            message_id: "777".into(),
            sender_id: Some("123".into()),
        });
        assert_eq!(router().route(&msg), RouteDecision::Ignore);
    }

    #[test]
    fn test_query_is_trimmed() {
        assert_eq!(
            router().route(&group_text("/ai    padded question   ")),
            RouteDecision::Respond {
                query: "padded question".into()
            }
        );
    }

    #[test]
    fn test_command_body_is_not_routed() {
        let msg = InboundMessage::new(
            "telegram",
            "42",
            "1001",
            ChatKind::Group,
            MessageBody::Command(crate::events::BotCommand::Help),
        );
        assert_eq!(router().route(&msg), RouteDecision::Ignore);
    }
}
