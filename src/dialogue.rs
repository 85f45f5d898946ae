//! Conversation state for the order flow and the validators guarding each step.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::commerce::{ServiceId, ServiceListing};

/// Maximum accepted length of a promotion link
pub const MAX_LINK_LEN: usize = 2048;

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"^\d+$").expect("number pattern should be valid");
    static ref USERNAME_RE: Regex =
        Regex::new(r"^@?([A-Za-z0-9_]{3,32})$").expect("username pattern should be valid");
    static ref MONEY_RE: Regex =
        Regex::new(r"^(\d{1,9})(?:[.,](\d{1,2}))?$").expect("money pattern should be valid");
}

/// A service picked from the candidate list, with the display fields cached
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedService {
    pub id: ServiceId,
    pub name: String,
    pub rate_per_thousand: f64,
}

impl From<&ServiceListing> for SelectedService {
    fn from(listing: &ServiceListing) -> Self {
        Self {
            id: listing.id,
            name: listing.name.clone(),
            rate_per_thousand: listing.rate_per_thousand,
        }
    }
}

/// Per-user conversation state.
///
/// Each variant carries exactly the fields captured so far, so a terminal
/// transition back to `Idle` drops everything from the previous flow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage")]
pub enum ConversationState {
    #[default]
    Idle,
    SelectPlatform,
    SelectCategory {
        platform: String,
    },
    SelectService {
        platform: String,
        category: String,
        candidates: Vec<SelectedService>,
    },
    EnterAmount {
        platform: String,
        category: String,
        service: SelectedService,
    },
    EnterLink {
        platform: String,
        category: String,
        service: SelectedService,
        amount: u64,
    },
    ConfirmOrder {
        platform: String,
        category: String,
        service: SelectedService,
        amount: u64,
        link: String,
    },
    AdminAwaitingUsernameForBalance,
    AdminAwaitingAmount {
        username: String,
    },
    AdminAwaitingUsernameForBlock,
}

/// Field-less view of [`ConversationState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    SelectPlatform,
    SelectCategory,
    SelectService,
    EnterAmount,
    EnterLink,
    ConfirmOrder,
    AdminAwaitingUsernameForBalance,
    AdminAwaitingAmount,
    AdminAwaitingUsernameForBlock,
}

impl ConversationState {
    pub fn stage(&self) -> Stage {
        match self {
            ConversationState::Idle => Stage::Idle,
            ConversationState::SelectPlatform => Stage::SelectPlatform,
            ConversationState::SelectCategory { .. } => Stage::SelectCategory,
            ConversationState::SelectService { .. } => Stage::SelectService,
            ConversationState::EnterAmount { .. } => Stage::EnterAmount,
            ConversationState::EnterLink { .. } => Stage::EnterLink,
            ConversationState::ConfirmOrder { .. } => Stage::ConfirmOrder,
            ConversationState::AdminAwaitingUsernameForBalance => {
                Stage::AdminAwaitingUsernameForBalance
            }
            ConversationState::AdminAwaitingAmount { .. } => Stage::AdminAwaitingAmount,
            ConversationState::AdminAwaitingUsernameForBlock => Stage::AdminAwaitingUsernameForBlock,
        }
    }

    pub fn platform(&self) -> Option<&str> {
        match self {
            ConversationState::SelectCategory { platform }
            | ConversationState::SelectService { platform, .. }
            | ConversationState::EnterAmount { platform, .. }
            | ConversationState::EnterLink { platform, .. }
            | ConversationState::ConfirmOrder { platform, .. } => Some(platform),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            ConversationState::SelectService { category, .. }
            | ConversationState::EnterAmount { category, .. }
            | ConversationState::EnterLink { category, .. }
            | ConversationState::ConfirmOrder { category, .. } => Some(category),
            _ => None,
        }
    }

    pub fn candidates(&self) -> &[SelectedService] {
        match self {
            ConversationState::SelectService { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub fn selected_service(&self) -> Option<&SelectedService> {
        match self {
            ConversationState::EnterAmount { service, .. }
            | ConversationState::EnterLink { service, .. }
            | ConversationState::ConfirmOrder { service, .. } => Some(service),
            _ => None,
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            ConversationState::EnterLink { amount, .. }
            | ConversationState::ConfirmOrder { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            ConversationState::ConfirmOrder { link, .. } => Some(link),
            _ => None,
        }
    }

    pub fn is_admin_flow(&self) -> bool {
        matches!(
            self.stage(),
            Stage::AdminAwaitingUsernameForBalance
                | Stage::AdminAwaitingAmount
                | Stage::AdminAwaitingUsernameForBlock
        )
    }

    /// Whether discarding this state loses order details the user typed in
    pub fn has_order_details(&self) -> bool {
        self.selected_service().is_some()
    }
}

/// Parsed inline keyboard callback data
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Platform(String),
    Category(String),
    Back,
    ConfirmOrder,
    CancelOrder,
    Faq(usize),
    AdminAddBalance,
    AdminBlockUser,
}

impl ButtonAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "back" => return Some(ButtonAction::Back),
            "confirm_order" => return Some(ButtonAction::ConfirmOrder),
            "cancel_order" => return Some(ButtonAction::CancelOrder),
            "admin_add_balance" => return Some(ButtonAction::AdminAddBalance),
            "admin_block_user" => return Some(ButtonAction::AdminBlockUser),
            _ => {}
        }

        if let Some(id) = data.strip_prefix("platform_").filter(|id| !id.is_empty()) {
            return Some(ButtonAction::Platform(id.to_string()));
        }
        if let Some(id) = data.strip_prefix("category_").filter(|id| !id.is_empty()) {
            return Some(ButtonAction::Category(id.to_string()));
        }
        data.strip_prefix("faq_")
            .and_then(|n| n.parse().ok())
            .map(ButtonAction::Faq)
    }

    /// Callback data for this action
    pub fn data(&self) -> String {
        match self {
            ButtonAction::Platform(id) => format!("platform_{id}"),
            ButtonAction::Category(id) => format!("category_{id}"),
            ButtonAction::Back => "back".to_string(),
            ButtonAction::ConfirmOrder => "confirm_order".to_string(),
            ButtonAction::CancelOrder => "cancel_order".to_string(),
            ButtonAction::Faq(n) => format!("faq_{n}"),
            ButtonAction::AdminAddBalance => "admin_add_balance".to_string(),
            ButtonAction::AdminBlockUser => "admin_block_user".to_string(),
        }
    }
}

/// Parse a whole-number reply (`^\d+$`). Leading/trailing whitespace is ignored.
pub fn parse_number(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    if !NUMBER_RE.is_match(trimmed) {
        return None;
    }
    trimmed.parse().ok()
}

/// Resolve a 1-based list index against the current candidates
pub fn resolve_candidate(candidates: &[SelectedService], index: u64) -> Option<&SelectedService> {
    let index = usize::try_from(index).ok()?;
    index.checked_sub(1).and_then(|i| candidates.get(i))
}

/// Validates a promotion link
pub fn validate_link(link: &str) -> Result<String, &'static str> {
    let trimmed = link.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_LINK_LEN {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

/// Validates a Telegram username, returning it lowercased without the `@`
pub fn validate_username(input: &str) -> Option<String> {
    USERNAME_RE
        .captures(input.trim())
        .map(|caps| caps[1].to_lowercase())
}

/// Parses a positive money amount with at most two decimals into cents
pub fn parse_money(input: &str) -> Option<u64> {
    let caps = MONEY_RE.captures(input.trim())?;
    let whole: u64 = caps[1].parse().ok()?;
    let fraction = match caps.get(2) {
        Some(m) if m.as_str().len() == 1 => m.as_str().parse::<u64>().ok()? * 10,
        Some(m) => m.as_str().parse::<u64>().ok()?,
        None => 0,
    };
    let cents = whole.checked_mul(100)?.checked_add(fraction)?;
    (cents > 0).then_some(cents)
}

/// Formats cents as `12.50`
pub fn format_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<SelectedService> {
        vec![
            SelectedService { id: 7, name: "A".into(), rate_per_thousand: 1.0 },
            SelectedService { id: 9, name: "B".into(), rate_per_thousand: 2.0 },
        ]
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12"), Some(12));
        assert_eq!(parse_number(" 3 "), Some(3));
        assert_eq!(parse_number("0"), Some(0));
        assert_eq!(parse_number("-1"), None);
        assert_eq!(parse_number("1.5"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("99999999999999999999999"), None);
    }

    #[test]
    fn test_resolve_candidate_is_one_based() {
        let list = candidates();
        assert_eq!(resolve_candidate(&list, 1).map(|s| s.id), Some(7));
        assert_eq!(resolve_candidate(&list, 2).map(|s| s.id), Some(9));
        assert!(resolve_candidate(&list, 0).is_none());
        assert!(resolve_candidate(&list, 3).is_none());
    }

    #[test]
    fn test_link_validation() {
        assert_eq!(validate_link("  https://x  ").unwrap(), "https://x");
        assert_eq!(validate_link("   "), Err("empty"));
        assert_eq!(validate_link(&"a".repeat(MAX_LINK_LEN + 1)), Err("too_long"));
    }

    #[test]
    fn test_username_validation() {
        assert_eq!(validate_username("@Some_User").as_deref(), Some("some_user"));
        assert_eq!(validate_username("plain123").as_deref(), Some("plain123"));
        assert_eq!(validate_username("@ab"), None);
        assert_eq!(validate_username("bad name"), None);
    }

    #[test]
    fn test_money_parsing() {
        assert_eq!(parse_money("12"), Some(1200));
        assert_eq!(parse_money("12.5"), Some(1250));
        assert_eq!(parse_money("12,05"), Some(1205));
        assert_eq!(parse_money("0"), None);
        assert_eq!(parse_money("1.234"), None);
        assert_eq!(parse_money("-3"), None);
        assert_eq!(format_cents(1205), "12.05");
    }

    #[test]
    fn test_button_round_trip_for_known_ids() {
        for action in [
            ButtonAction::Platform("instagram".into()),
            ButtonAction::Category("likes".into()),
            ButtonAction::Back,
            ButtonAction::ConfirmOrder,
            ButtonAction::CancelOrder,
            ButtonAction::Faq(3),
            ButtonAction::AdminAddBalance,
            ButtonAction::AdminBlockUser,
        ] {
            assert_eq!(ButtonAction::parse(&action.data()), Some(action));
        }
        assert_eq!(ButtonAction::parse("platform_"), None);
        assert_eq!(ButtonAction::parse("delete_3"), None);
    }

    #[test]
    fn test_terminal_state_carries_nothing() {
        let state = ConversationState::default();
        assert_eq!(state.stage(), Stage::Idle);
        assert!(state.selected_service().is_none());
        assert!(state.amount().is_none());
        assert!(state.link().is_none());
    }
}
