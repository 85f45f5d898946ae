//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

// Import localization
use crate::localization::t_lang;

use super::dialogue_manager::{Actor, Event};
use super::gateway::{deliver, MessagingGateway, TelegramGateway};
use super::ui_builder::Reply;
use super::AppState;

pub async fn message_handler(bot: Bot, msg: Message, app: Arc<AppState>) -> Result<()> {
    let gateway = TelegramGateway::new(bot);

    // Channel posts and service messages have no sender to hold a conversation with
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };

    let actor = Actor {
        user_id: user.id.0 as i64,
        chat_id: msg.chat.id.0,
        username: user.username.clone(),
        language_code: user.language_code.clone(),
    };

    match msg.text() {
        Some(text) => {
            debug!(user_id = actor.user_id, "Received text message");
            deliver(&gateway, &app, &actor, Event::Text(text.to_string()), None).await
        }
        None => handle_unsupported_message(&gateway, &actor).await,
    }
}

async fn handle_unsupported_message(gateway: &dyn MessagingGateway, actor: &Actor) -> Result<()> {
    debug!(user_id = actor.user_id, "Received unsupported message type");
    let reply = Reply::text(t_lang("follow-steps", actor.language_code.as_deref()));
    gateway.send_message(actor.chat_id, &reply).await
}
