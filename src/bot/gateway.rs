//! Messaging gateway: where replies go and how button presses are acknowledged.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::CallbackQueryId;
use tracing::{debug, error};

use super::dialogue_manager::{Actor, Event};
use super::ui_builder::{to_reply_markup, Reply};
use super::AppState;

/// Outbound side of the chat transport
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<()>;
    /// Acknowledge a button press so the client stops showing a spinner
    async fn answer_button(&self, callback_id: String) -> Result<()>;
}

/// Telegram Bot API gateway
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let request = self.bot.send_message(ChatId(chat_id), reply.text.clone());
        match &reply.keyboard {
            Some(keyboard) => request.reply_markup(to_reply_markup(keyboard)).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn answer_button(&self, callback_id: String) -> Result<()> {
        self.bot
            .answer_callback_query(CallbackQueryId(callback_id))
            .await?;
        Ok(())
    }
}

/// Run one event through the controller and deliver the outcome.
///
/// Button presses are acknowledged first. The reply is sent to the actor's
/// chat; a failed channel notification is logged and does not fail the event.
pub async fn deliver<G>(
    gateway: &G,
    app: &AppState,
    actor: &Actor,
    event: Event,
    callback_id: Option<String>,
) -> Result<()>
where
    G: MessagingGateway + ?Sized,
{
    if let Some(callback_id) = callback_id {
        if let Err(e) = gateway.answer_button(callback_id).await {
            error!(user_id = actor.user_id, error = %e, "Failed to answer callback query");
        }
    }

    let outcome = app.controller.handle(actor, event).await;
    gateway.send_message(actor.chat_id, &outcome.reply).await?;
    debug!(user_id = actor.user_id, "Reply delivered");

    if let (Some(notification), Some(chat)) = (outcome.notification, app.notification_chat) {
        if let Err(e) = gateway.send_message(chat, &Reply::text(notification)).await {
            error!(channel = chat, error = %e, "Failed to post order notification");
        }
    }

    Ok(())
}
