//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles incoming text messages
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `gateway`: Sends replies and acknowledges button presses
//! - `ui_builder`: Creates keyboards and formats messages
//! - `dialogue_manager`: The conversation flow controller

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

pub mod callback_handler;
pub mod dialogue_manager;
pub mod gateway;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use dialogue_manager::{Actor, AdminPolicy, Event, FlowController, FlowError, Outcome};
pub use gateway::{deliver, MessagingGateway, TelegramGateway};
pub use ui_builder::{Button, Keyboard, Reply};

/// Shared state injected into every handler
pub struct AppState {
    pub controller: FlowController,
    /// Chat receiving a notice for every confirmed order
    pub notification_chat: Option<i64>,
}

/// Update routing: messages and callback queries, everything else is ignored
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler))
}
