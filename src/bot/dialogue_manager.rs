//! Dialogue Manager module: the conversation flow controller.
//!
//! Maps `(current state, event)` to the next state and exactly one reply.
//! The order flow is linear:
//!
//! `Idle → SelectPlatform → SelectCategory → SelectService → EnterAmount → EnterLink → ConfirmOrder → Idle`
//!
//! with an admin branch for crediting wallets and blocking users. Errors never
//! escape [`FlowController::handle`]: each one is turned into a reply and the
//! stored state is left as it was.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

// Import localization
use crate::localization::{matches_any_language, t_args_lang, t_lang};

use crate::accounts::AccountRegistry;
use crate::catalog::Catalog;
use crate::commerce::{CommerceApi, OrderRequest};
use crate::commerce_errors::CommerceError;
use crate::dialogue::{
    format_cents, parse_money, parse_number, resolve_candidate, validate_link, validate_username,
    ButtonAction, ConversationState, SelectedService,
};
use crate::session_store::{ConversationStore, UserKey};

use super::ui_builder::{
    admin_keyboard, back_keyboard, category_keyboard, confirm_keyboard, faq_keyboard,
    format_order_summary, format_service_list, main_menu_keyboard, platform_keyboard, Reply,
    FAQ_COUNT,
};

/// Who sent an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserKey,
    pub chat_id: i64,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl Actor {
    fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.user_id.to_string(),
        }
    }
}

/// An inbound user event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Commands and free text
    Text(String),
    /// Inline keyboard callback data
    Button(String),
}

/// Result of handling one event
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// The single message sent back to the user
    pub reply: Reply,
    /// Operator message for the notification channel, if any
    pub notification: Option<String>,
}

/// Why an event did not advance the conversation
#[derive(Debug)]
pub enum FlowError {
    /// Malformed or out-of-range input; the reply re-prompts
    InvalidInput(Reply),
    /// Commerce API failure; safe to retry the same step
    Upstream { source: CommerceError, reply: Reply },
    /// Non-admin reached an admin transition
    Unauthorized,
    /// Event the current stage does not expect
    OutOfStep,
    /// Sender is on the block list
    Blocked,
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowError::InvalidInput(_) => write!(f, "Invalid input"),
            FlowError::Upstream { source, .. } => write!(f, "Upstream failure: {source}"),
            FlowError::Unauthorized => write!(f, "Unauthorized admin action"),
            FlowError::OutOfStep => write!(f, "Event not expected at this stage"),
            FlowError::Blocked => write!(f, "Blocked user"),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::Upstream { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Configured admin identities
#[derive(Clone, Debug, Default)]
pub struct AdminPolicy {
    ids: HashSet<UserKey>,
}

impl AdminPolicy {
    pub fn new(ids: impl IntoIterator<Item = UserKey>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, user: UserKey) -> bool {
        self.ids.contains(&user)
    }
}

struct Transition {
    next: ConversationState,
    reply: Reply,
    notification: Option<String>,
}

impl Transition {
    fn to(next: ConversationState, reply: Reply) -> Self {
        Self {
            next,
            reply,
            notification: None,
        }
    }
}

/// The conversation flow controller
pub struct FlowController {
    commerce: Arc<dyn CommerceApi>,
    catalog: Arc<Catalog>,
    sessions: Arc<ConversationStore>,
    accounts: Arc<AccountRegistry>,
    admins: AdminPolicy,
    support_contact: String,
}

impl FlowController {
    pub fn new(
        commerce: Arc<dyn CommerceApi>,
        catalog: Arc<Catalog>,
        admins: AdminPolicy,
        support_contact: impl Into<String>,
    ) -> Self {
        Self {
            commerce,
            catalog,
            sessions: Arc::new(ConversationStore::new()),
            accounts: Arc::new(AccountRegistry::new()),
            admins,
            support_contact: support_contact.into(),
        }
    }

    pub fn sessions(&self) -> &Arc<ConversationStore> {
        &self.sessions
    }

    pub fn accounts(&self) -> &Arc<AccountRegistry> {
        &self.accounts
    }

    /// Handle one event for `actor`.
    ///
    /// The user's session stays locked until the reply is decided, so events
    /// from the same user are processed one at a time.
    pub async fn handle(&self, actor: &Actor, event: Event) -> Outcome {
        let session = self.sessions.session(actor.user_id);
        let mut state = session.lock().await;
        let from = state.stage();
        debug!(user_id = actor.user_id, stage = ?from, event = ?event, "Handling event");

        match self.step(actor, &state, event).await {
            Ok(transition) => {
                if transition.next.stage() != from {
                    info!(
                        user_id = actor.user_id,
                        from = ?from,
                        to = ?transition.next.stage(),
                        platform = transition.next.platform(),
                        category = transition.next.category(),
                        "Stage transition"
                    );
                }
                *state = transition.next;
                Outcome {
                    reply: transition.reply,
                    notification: transition.notification,
                }
            }
            Err(e) => {
                match &e {
                    FlowError::Upstream { source, .. } => {
                        warn!(user_id = actor.user_id, stage = ?from, error = %source, "Commerce API call failed")
                    }
                    other => debug!(user_id = actor.user_id, stage = ?from, error = %other, "Event rejected"),
                }
                Outcome {
                    reply: self.error_reply(e, actor.language_code.as_deref()),
                    notification: None,
                }
            }
        }
    }

    fn error_reply(&self, error: FlowError, language_code: Option<&str>) -> Reply {
        match error {
            FlowError::InvalidInput(reply) | FlowError::Upstream { reply, .. } => reply,
            FlowError::Unauthorized => Reply::text(t_lang("admin-unauthorized", language_code)),
            FlowError::OutOfStep => Reply::text(t_lang("follow-steps", language_code)),
            FlowError::Blocked => Reply::text(t_lang("user-blocked", language_code)),
        }
    }

    async fn step(
        &self,
        actor: &Actor,
        state: &ConversationState,
        event: Event,
    ) -> Result<Transition, FlowError> {
        if !self.admins.is_admin(actor.user_id) {
            if let Some(username) = &actor.username {
                if self.accounts.is_blocked(username) {
                    return Err(FlowError::Blocked);
                }
            }
        }

        match event {
            Event::Text(text) => self.on_text(actor, state, text.trim()).await,
            Event::Button(data) => match ButtonAction::parse(&data) {
                Some(action) => self.on_button(actor, state, action).await,
                None => Err(FlowError::OutOfStep),
            },
        }
    }

    fn require_admin(&self, actor: &Actor) -> Result<(), FlowError> {
        if self.admins.is_admin(actor.user_id) {
            Ok(())
        } else {
            warn!(user_id = actor.user_id, "Non-admin attempted an admin action");
            Err(FlowError::Unauthorized)
        }
    }

    /// Prefix the discard warning when `state` holds order details
    fn discarding(state: &ConversationState, reply: Reply, language_code: Option<&str>) -> Reply {
        if state.has_order_details() {
            reply.prefixed(&t_lang("flow-discarded", language_code))
        } else {
            reply
        }
    }

    async fn on_text(
        &self,
        actor: &Actor,
        state: &ConversationState,
        text: &str,
    ) -> Result<Transition, FlowError> {
        let lang = actor.language_code.as_deref();

        if let Some(command) = text.strip_prefix('/') {
            let command = command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            return self.on_command(actor, state, command).await;
        }

        if matches_any_language("menu-new-order", text) {
            let reply = Reply::with_keyboard(
                t_lang("select-platform", lang),
                platform_keyboard(&self.catalog, lang),
            );
            return Ok(Transition::to(
                ConversationState::SelectPlatform,
                Self::discarding(state, reply, lang),
            ));
        }
        if matches_any_language("menu-faq", text) {
            return Ok(Transition::to(
                ConversationState::Idle,
                Self::discarding(state, self.faq_reply(lang), lang),
            ));
        }
        if matches_any_language("menu-support", text) {
            let reply = Reply::text(t_args_lang(
                "support",
                &[("contact", &self.support_contact)],
                lang,
            ));
            return Ok(Transition::to(
                ConversationState::Idle,
                Self::discarding(state, reply, lang),
            ));
        }
        if matches_any_language("menu-wallet", text) {
            let reply = self.wallet_reply(actor).await;
            return Ok(Transition::to(
                ConversationState::Idle,
                Self::discarding(state, reply, lang),
            ));
        }

        match state {
            ConversationState::SelectService {
                platform,
                category,
                candidates,
            } => self.select_service(platform, category, candidates, text, lang),
            ConversationState::EnterAmount {
                platform,
                category,
                service,
            } => {
                let invalid = || {
                    FlowError::InvalidInput(Reply::with_keyboard(
                        t_lang("invalid-amount", lang),
                        back_keyboard(lang),
                    ))
                };
                let amount = parse_number(text).ok_or_else(invalid)?;
                let minimum = self.catalog.minimum_for(service.id);
                if amount < minimum {
                    return Err(FlowError::InvalidInput(Reply::with_keyboard(
                        t_args_lang("amount-below-minimum", &[("minimum", &minimum.to_string())], lang),
                        back_keyboard(lang),
                    )));
                }
                Ok(Transition::to(
                    ConversationState::EnterLink {
                        platform: platform.clone(),
                        category: category.clone(),
                        service: service.clone(),
                        amount,
                    },
                    Reply::with_keyboard(t_lang("enter-link", lang), back_keyboard(lang)),
                ))
            }
            ConversationState::EnterLink {
                platform,
                category,
                service,
                amount,
            } => {
                let link = validate_link(text).map_err(|reason| {
                    let key = if reason == "too_long" { "link-too-long" } else { "invalid-link" };
                    FlowError::InvalidInput(Reply::with_keyboard(t_lang(key, lang), back_keyboard(lang)))
                })?;
                let summary = format_order_summary(service, *amount, &link, lang);
                Ok(Transition::to(
                    ConversationState::ConfirmOrder {
                        platform: platform.clone(),
                        category: category.clone(),
                        service: service.clone(),
                        amount: *amount,
                        link,
                    },
                    Reply::with_keyboard(summary, confirm_keyboard(lang)),
                ))
            }
            ConversationState::AdminAwaitingUsernameForBalance => {
                self.require_admin(actor)?;
                let username = validate_username(text).ok_or_else(|| {
                    FlowError::InvalidInput(Reply::text(t_lang("admin-invalid-username", lang)))
                })?;
                let prompt = t_args_lang("admin-enter-amount", &[("username", &username)], lang);
                Ok(Transition::to(
                    ConversationState::AdminAwaitingAmount { username },
                    Reply::text(prompt),
                ))
            }
            ConversationState::AdminAwaitingAmount { username } => {
                self.require_admin(actor)?;
                let cents = parse_money(text).ok_or_else(|| {
                    FlowError::InvalidInput(Reply::text(t_lang("admin-invalid-amount", lang)))
                })?;
                let total = self.accounts.credit(username, cents);
                info!(admin_id = actor.user_id, username = %username, cents, total, "Credited wallet");
                let reply = t_args_lang(
                    "admin-balance-added",
                    &[
                        ("amount", &format_cents(cents)),
                        ("username", username),
                        ("total", &format_cents(total)),
                    ],
                    lang,
                );
                Ok(Transition::to(ConversationState::Idle, Reply::text(reply)))
            }
            ConversationState::AdminAwaitingUsernameForBlock => {
                self.require_admin(actor)?;
                let username = validate_username(text).ok_or_else(|| {
                    FlowError::InvalidInput(Reply::text(t_lang("admin-invalid-username", lang)))
                })?;
                let key = if self.accounts.block(&username) {
                    info!(admin_id = actor.user_id, username = %username, "Blocked user");
                    "admin-user-blocked"
                } else {
                    "admin-user-already-blocked"
                };
                Ok(Transition::to(
                    ConversationState::Idle,
                    Reply::text(t_args_lang(key, &[("username", &username)], lang)),
                ))
            }
            _ => Err(FlowError::OutOfStep),
        }
    }

    async fn on_command(
        &self,
        actor: &Actor,
        state: &ConversationState,
        command: &str,
    ) -> Result<Transition, FlowError> {
        let lang = actor.language_code.as_deref();
        match command {
            "start" => {
                let reply = Reply::with_keyboard(t_lang("welcome", lang), main_menu_keyboard(lang));
                Ok(Transition::to(
                    ConversationState::Idle,
                    Self::discarding(state, reply, lang),
                ))
            }
            "cancel" => {
                let reply = Reply::with_keyboard(t_lang("cancelled", lang), main_menu_keyboard(lang));
                Ok(Transition::to(
                    ConversationState::Idle,
                    Self::discarding(state, reply, lang),
                ))
            }
            "help" | "faq" => Ok(Transition::to(
                ConversationState::Idle,
                Self::discarding(state, self.faq_reply(lang), lang),
            )),
            "admin" => {
                self.require_admin(actor)?;
                let reply = Reply::with_keyboard(t_lang("admin-menu", lang), admin_keyboard(lang));
                Ok(Transition::to(
                    ConversationState::Idle,
                    Self::discarding(state, reply, lang),
                ))
            }
            _ => Err(FlowError::OutOfStep),
        }
    }

    fn select_service(
        &self,
        platform: &str,
        category: &str,
        candidates: &[SelectedService],
        text: &str,
        lang: Option<&str>,
    ) -> Result<Transition, FlowError> {
        let reprompt = || {
            FlowError::InvalidInput(Reply::with_keyboard(
                t_args_lang("invalid-service-number", &[("max", &candidates.len().to_string())], lang),
                back_keyboard(lang),
            ))
        };
        let index = parse_number(text).ok_or_else(reprompt)?;
        let service = resolve_candidate(candidates, index).ok_or_else(reprompt)?;

        let minimum = self.catalog.minimum_for(service.id);
        Ok(Transition::to(
            ConversationState::EnterAmount {
                platform: platform.to_string(),
                category: category.to_string(),
                service: service.clone(),
            },
            Reply::with_keyboard(
                t_args_lang("enter-amount", &[("minimum", &minimum.to_string())], lang),
                back_keyboard(lang),
            ),
        ))
    }

    async fn on_button(
        &self,
        actor: &Actor,
        state: &ConversationState,
        action: ButtonAction,
    ) -> Result<Transition, FlowError> {
        let lang = actor.language_code.as_deref();

        match (action, state) {
            (ButtonAction::Platform(id), ConversationState::SelectPlatform) => {
                let platform = self.catalog.platform(&id).ok_or(FlowError::OutOfStep)?;
                Ok(Transition::to(
                    ConversationState::SelectCategory {
                        platform: platform.id.clone(),
                    },
                    Reply::with_keyboard(
                        t_args_lang("select-category", &[("platform", &platform.label)], lang),
                        category_keyboard(platform, lang),
                    ),
                ))
            }
            (ButtonAction::Category(id), ConversationState::SelectCategory { platform }) => {
                self.select_category(state, platform, &id, lang).await
            }
            (ButtonAction::Back, current) => self.go_back(current, lang),
            (
                ButtonAction::ConfirmOrder,
                ConversationState::ConfirmOrder {
                    service,
                    amount,
                    link,
                    ..
                },
            ) => self.confirm_order(actor, service, *amount, link).await,
            (ButtonAction::CancelOrder, current)
                if !matches!(current, ConversationState::Idle) && !current.is_admin_flow() =>
            {
                Ok(Transition::to(
                    ConversationState::Idle,
                    Reply::with_keyboard(t_lang("order-cancelled", lang), main_menu_keyboard(lang)),
                ))
            }
            (ButtonAction::Faq(n), current) if (1..=FAQ_COUNT).contains(&n) => Ok(Transition::to(
                current.clone(),
                Reply::text(format!(
                    "❓ {}\n\n{}",
                    t_lang(&format!("faq-q{n}"), lang),
                    t_lang(&format!("faq-a{n}"), lang)
                )),
            )),
            (ButtonAction::AdminAddBalance, current) => {
                self.require_admin(actor)?;
                Ok(Transition::to(
                    ConversationState::AdminAwaitingUsernameForBalance,
                    Self::discarding(current, Reply::text(t_lang("admin-enter-username", lang)), lang),
                ))
            }
            (ButtonAction::AdminBlockUser, current) => {
                self.require_admin(actor)?;
                Ok(Transition::to(
                    ConversationState::AdminAwaitingUsernameForBlock,
                    Self::discarding(current, Reply::text(t_lang("admin-enter-username", lang)), lang),
                ))
            }
            _ => Err(FlowError::OutOfStep),
        }
    }

    async fn select_category(
        &self,
        state: &ConversationState,
        platform_id: &str,
        category_id: &str,
        lang: Option<&str>,
    ) -> Result<Transition, FlowError> {
        let platform = self.catalog.platform(platform_id).ok_or(FlowError::OutOfStep)?;
        let category = self
            .catalog
            .category(platform_id, category_id)
            .ok_or(FlowError::OutOfStep)?;

        let listings = self
            .commerce
            .list_services()
            .await
            .map_err(|source| FlowError::Upstream {
                source,
                reply: Reply::with_keyboard(
                    t_lang("services-failed", lang),
                    category_keyboard(platform, lang),
                ),
            })?;

        let candidates: Vec<SelectedService> = category
            .services
            .iter()
            .filter_map(|id| listings.iter().find(|listing| listing.id == *id))
            .map(SelectedService::from)
            .collect();

        if candidates.is_empty() {
            warn!(platform = %platform.id, category = %category.id, "No configured services present in panel catalog");
            return Ok(Transition::to(
                state.clone(),
                Reply::with_keyboard(t_lang("no-services", lang), category_keyboard(platform, lang)),
            ));
        }

        let text = format_service_list(&platform.label, &category.label, &candidates, lang);
        Ok(Transition::to(
            ConversationState::SelectService {
                platform: platform.id.clone(),
                category: category.id.clone(),
                candidates,
            },
            Reply::with_keyboard(text, back_keyboard(lang)),
        ))
    }

    fn go_back(&self, state: &ConversationState, lang: Option<&str>) -> Result<Transition, FlowError> {
        match state {
            ConversationState::Idle => Err(FlowError::OutOfStep),
            ConversationState::SelectPlatform => Ok(Transition::to(
                ConversationState::Idle,
                Reply::with_keyboard(t_lang("cancelled", lang), main_menu_keyboard(lang)),
            )),
            ConversationState::SelectCategory { .. }
            | ConversationState::SelectService { .. }
            | ConversationState::EnterAmount { .. }
            | ConversationState::EnterLink { .. }
            | ConversationState::ConfirmOrder { .. } => {
                let reply = Reply::with_keyboard(
                    t_lang("select-platform", lang),
                    platform_keyboard(&self.catalog, lang),
                );
                Ok(Transition::to(
                    ConversationState::SelectPlatform,
                    Self::discarding(state, reply, lang),
                ))
            }
            ConversationState::AdminAwaitingUsernameForBalance
            | ConversationState::AdminAwaitingAmount { .. }
            | ConversationState::AdminAwaitingUsernameForBlock => Ok(Transition::to(
                ConversationState::Idle,
                Reply::with_keyboard(t_lang("cancelled", lang), main_menu_keyboard(lang)),
            )),
        }
    }

    async fn confirm_order(
        &self,
        actor: &Actor,
        service: &SelectedService,
        amount: u64,
        link: &str,
    ) -> Result<Transition, FlowError> {
        let lang = actor.language_code.as_deref();
        let request = OrderRequest {
            service_id: service.id,
            link: link.to_string(),
            quantity: amount,
        };

        match self.commerce.place_order(&request).await {
            Ok(order_id) => {
                info!(user_id = actor.user_id, order_id = %order_id, service_id = service.id, amount, "Order confirmed");
                let notification = t_args_lang(
                    "order-notification",
                    &[
                        ("order", &order_id.to_string()),
                        ("service", &service.name),
                        ("amount", &amount.to_string()),
                        ("user", &actor.display_name()),
                    ],
                    None,
                );
                Ok(Transition {
                    next: ConversationState::Idle,
                    reply: Reply::with_keyboard(
                        t_args_lang("order-placed", &[("order", &order_id.to_string())], lang),
                        main_menu_keyboard(lang),
                    ),
                    notification: Some(notification),
                })
            }
            Err(CommerceError::Rejected(reason)) => {
                warn!(user_id = actor.user_id, service_id = service.id, reason = %reason, "Panel rejected order");
                Ok(Transition::to(
                    ConversationState::Idle,
                    Reply::with_keyboard(t_lang("order-failed", lang), main_menu_keyboard(lang)),
                ))
            }
            Err(source) => Err(FlowError::Upstream {
                source,
                reply: Reply::with_keyboard(t_lang("order-upstream-failed", lang), confirm_keyboard(lang)),
            }),
        }
    }

    fn faq_reply(&self, lang: Option<&str>) -> Reply {
        Reply::with_keyboard(
            format!("{}\n\n{}", t_lang("faq-title", lang), t_lang("faq-hint", lang)),
            faq_keyboard(lang),
        )
    }

    async fn wallet_reply(&self, actor: &Actor) -> Reply {
        let lang = actor.language_code.as_deref();
        match self.commerce.get_balance().await {
            Ok(balance) => {
                let currency = balance.currency.unwrap_or_default();
                let mut text = t_args_lang(
                    "wallet-balance",
                    &[("balance", &balance.amount), ("currency", &currency)],
                    lang,
                )
                .trim_end()
                .to_string();
                let credit = actor
                    .username
                    .as_deref()
                    .map(|username| self.accounts.credit_of(username))
                    .unwrap_or(0);
                if credit > 0 {
                    text.push('\n');
                    text.push_str(&t_args_lang("wallet-credit", &[("credit", &format_cents(credit))], lang));
                }
                Reply::text(text)
            }
            Err(e) => {
                warn!(user_id = actor.user_id, error = %e, "Failed to fetch balance");
                Reply::text(t_lang("wallet-failed", lang))
            }
        }
    }
}
