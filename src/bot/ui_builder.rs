//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::catalog::{Catalog, Platform};
use crate::dialogue::{ButtonAction, SelectedService};

/// Number of FAQ entries in the message catalog
pub const FAQ_COUNT: usize = 5;

/// One inline button
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            data: action.data(),
        }
    }
}

/// Keyboard attached to a reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply keyboard (main menu)
    Reply(Vec<Vec<String>>),
    /// Ephemeral inline choices
    Inline(Vec<Vec<Button>>),
}

/// A single outbound message
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Put a notice line above the message text
    pub fn prefixed(mut self, notice: &str) -> Self {
        self.text = format!("{notice}\n\n{}", self.text);
        self
    }

    pub fn inline_buttons(&self) -> Vec<&Button> {
        match &self.keyboard {
            Some(Keyboard::Inline(rows)) => rows.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }
}

/// Main menu reply keyboard
pub fn main_menu_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::Reply(vec![
        vec![
            t_lang("menu-new-order", language_code),
            t_lang("menu-faq", language_code),
        ],
        vec![
            t_lang("menu-support", language_code),
            t_lang("menu-wallet", language_code),
        ],
    ])
}

fn back_row(language_code: Option<&str>) -> Vec<Button> {
    vec![Button::new(t_lang("button-back", language_code), ButtonAction::Back)]
}

/// One button per platform, plus Back
pub fn platform_keyboard(catalog: &Catalog, language_code: Option<&str>) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = catalog
        .platforms
        .iter()
        .map(|platform| {
            vec![Button::new(
                platform.label.clone(),
                ButtonAction::Platform(platform.id.clone()),
            )]
        })
        .collect();
    rows.push(back_row(language_code));
    Keyboard::Inline(rows)
}

/// One button per category of `platform`, plus Back
pub fn category_keyboard(platform: &Platform, language_code: Option<&str>) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = platform
        .categories
        .iter()
        .map(|category| {
            vec![Button::new(
                category.label.clone(),
                ButtonAction::Category(category.id.clone()),
            )]
        })
        .collect();
    rows.push(back_row(language_code));
    Keyboard::Inline(rows)
}

/// Back only, shown under prompts that expect typed input
pub fn back_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::Inline(vec![back_row(language_code)])
}

pub fn confirm_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::Inline(vec![
        vec![
            Button::new(t_lang("button-confirm", language_code), ButtonAction::ConfirmOrder),
            Button::new(t_lang("button-cancel", language_code), ButtonAction::CancelOrder),
        ],
        back_row(language_code),
    ])
}

pub fn faq_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::Inline(
        (1..=FAQ_COUNT)
            .map(|n| {
                vec![Button::new(
                    format!("{n}. {}", t_lang(&format!("faq-q{n}"), language_code)),
                    ButtonAction::Faq(n),
                )]
            })
            .collect(),
    )
}

pub fn admin_keyboard(language_code: Option<&str>) -> Keyboard {
    Keyboard::Inline(vec![
        vec![Button::new(
            t_lang("admin-button-add-balance", language_code),
            ButtonAction::AdminAddBalance,
        )],
        vec![Button::new(
            t_lang("admin-button-block", language_code),
            ButtonAction::AdminBlockUser,
        )],
    ])
}

/// Render a rate without trailing zeros (`0.9`, `12`, `0.00004`)
pub fn format_rate(rate: f64) -> String {
    let formatted = format!("{rate:.8}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Estimated price of `amount` units at `rate_per_thousand`
pub fn estimated_cost(rate_per_thousand: f64, amount: u64) -> String {
    format!("{:.2}", rate_per_thousand * amount as f64 / 1000.0)
}

/// Format the service candidates as the numbered list users pick from
pub fn format_service_list(
    platform_label: &str,
    category_label: &str,
    candidates: &[SelectedService],
    language_code: Option<&str>,
) -> String {
    let mut result = t_args_lang(
        "service-list-title",
        &[("platform", platform_label), ("category", category_label)],
        language_code,
    );
    result.push_str("\n\n");

    for (i, service) in candidates.iter().enumerate() {
        result.push_str(&format!(
            "{}. {}\n{}\n\n",
            i + 1,
            t_args_lang("service-entry-name", &[("name", &service.name)], language_code),
            t_args_lang(
                "service-entry-price",
                &[("rate", &format_rate(service.rate_per_thousand))],
                language_code
            )
        ));
    }

    result.push_str(&t_lang("service-list-footer", language_code));
    result
}

/// Order summary shown with the Confirm / Cancel buttons
pub fn format_order_summary(
    service: &SelectedService,
    amount: u64,
    link: &str,
    language_code: Option<&str>,
) -> String {
    let amount_text = amount.to_string();
    [
        t_lang("confirm-title", language_code),
        String::new(),
        t_args_lang("order-service", &[("name", &service.name)], language_code),
        t_args_lang("order-quantity", &[("amount", &amount_text)], language_code),
        t_args_lang("order-link", &[("link", link)], language_code),
        t_args_lang(
            "order-cost",
            &[("cost", &estimated_cost(service.rate_per_thousand, amount))],
            language_code,
        ),
    ]
    .join("\n")
}

/// Convert a keyboard into Telegram reply markup
pub fn to_reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Reply(rows) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                rows.iter()
                    .map(|row| row.iter().map(|label| KeyboardButton::new(label.clone())).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            )
            .resize_keyboard(),
        ),
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.data.clone()))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.9), "0.9");
        assert_eq!(format_rate(12.0), "12");
        assert_eq!(format_rate(1.2345), "1.2345");
    }

    #[test]
    fn test_format_rate_keeps_sub_cent_rates() {
        assert_eq!(format_rate(0.00004), "0.00004");
        assert_eq!(format_rate(0.0000125), "0.0000125");
        assert_eq!(format_rate(0.0), "0");
    }

    #[test]
    fn test_estimated_cost() {
        assert_eq!(estimated_cost(0.9, 1000), "0.90");
        assert_eq!(estimated_cost(2.5, 100), "0.25");
    }

    #[test]
    fn test_inline_markup_keeps_callback_data() {
        let keyboard = Keyboard::Inline(vec![vec![Button::new("Go", ButtonAction::ConfirmOrder)]]);
        match to_reply_markup(&keyboard) {
            ReplyMarkup::InlineKeyboard(markup) => {
                assert_eq!(markup.inline_keyboard.len(), 1);
                assert_eq!(markup.inline_keyboard[0][0].text, "Go");
            }
            other => panic!("unexpected markup {other:?}"),
        }
    }
}
