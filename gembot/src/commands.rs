//! Command surface: start, reset, help, about.

use crate::events::{BotCommand, InboundMessage, OutboundMessage};
use crate::session::SessionStore;
use tracing::info;

/// Handle a parsed command and build the reply.
pub async fn handle(
    command: BotCommand,
    msg: &InboundMessage,
    store: &SessionStore,
    triggers: &[String],
) -> OutboundMessage {
    let key = msg.session_key();
    let text = match command {
        BotCommand::Start => {
            // Starting over also forgets any prior conversation.
            store.reset(&key).await;
            info!(conversation = %key, sender = %msg.sender_id, "conversation started");
            welcome_text(msg.sender_name.as_deref())
        }
        BotCommand::Reset => {
            if store.reset(&key).await {
                info!(conversation = %key, sender = %msg.sender_id, "history reset by user");
                "Okay, I've forgotten our previous conversation in this chat.".to_string()
            } else {
                "Looks like there's no conversation to reset here yet.".to_string()
            }
        }
        BotCommand::Help => help_text(triggers),
        BotCommand::About => {
            "I'm a relay bot: I forward your messages to Google's Gemini model and \
             send its replies back. Conversation history lives in memory only and \
             is gone when I restart."
                .to_string()
        }
    };
    OutboundMessage::reply_to(msg, text)
}

fn welcome_text(sender_name: Option<&str>) -> String {
    match sender_name {
        Some(name) => format!(
            "Hello {name}! I'm an AI bot connected to Gemini. Send me a message and I'll answer."
        ),
        None => "Hello! I'm an AI bot connected to Gemini. Send me a message and I'll answer."
            .to_string(),
    }
}

fn help_text(triggers: &[String]) -> String {
    let mut text = String::from(
        "Need help? Available commands:\n\
         /start - Start over (forgets the conversation)\n\
         /reset - Forget the conversation in this chat\n\
         /about - About this bot\n\
         /help - Show this message\n\n\
         In a private chat, just send a message to talk to the AI.",
    );
    if !triggers.is_empty() {
        text.push_str(&format!(
            "\nIn a group, start your message with {} or reply to one of my messages.",
            triggers.join(" or ")
        ));
    }
    text
}
