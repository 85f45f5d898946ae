//! Callback Handler module for processing inline keyboard presses

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use super::dialogue_manager::{Actor, Event};
use super::gateway::{deliver, TelegramGateway};
use super::AppState;

pub async fn callback_handler(bot: Bot, q: CallbackQuery, app: Arc<AppState>) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    let gateway = TelegramGateway::new(bot);
    let user_id = q.from.id.0 as i64;
    // Inline keyboards only live in private chats, where chat id equals user id
    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat().id.0)
        .unwrap_or(user_id);

    let actor = Actor {
        user_id,
        chat_id,
        username: q.from.username.clone(),
        language_code: q.from.language_code.clone(),
    };

    let data = q.data.clone().unwrap_or_default();
    deliver(&gateway, &app, &actor, Event::Button(data), Some(q.id.to_string())).await
}
