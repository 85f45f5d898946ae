//! # SMM Order Bot
//!
//! A Telegram bot that walks users through ordering social-media marketing
//! services (followers, likes, comments) from an SMM panel API, with wallet,
//! FAQ and support side branches and a small admin menu.

pub mod accounts;
pub mod bot;
pub mod catalog;
pub mod circuit_breaker;
pub mod commerce;
pub mod commerce_config;
pub mod commerce_errors;
pub mod config;
pub mod dialogue;
pub mod health;
pub mod localization;
pub mod session_store;
