//! # Localization Tests
//!
//! Message retrieval, argument formatting, fallback and language detection.

use smm_order_bot::localization::{
    detect_language, init_localization, matches_any_language, t_args_lang, t_lang,
    LocalizationManager,
};
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("follow-steps", "en", None);
        assert_eq!(message, "⚠️ Please follow the steps properly.");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("follow-steps", "de", None);
        // Should fall back to English
        assert_eq!(message, manager.get_message_in_language("follow-steps", "en", None));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("minimum", "50");
        let message = manager.get_message_in_language("enter-amount", "en", Some(&args));
        assert!(message.contains("minimum 50"));
        // Isolation marks are disabled for chat output
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_french_messages() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("menu-new-order", "fr", None);
        assert_eq!(message, "📋 Nouvelle commande");
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Some("fr")), "fr");
        assert_eq!(detect_language(Some("fr-CA")), "fr");
        assert_eq!(detect_language(Some("EN_us")), "en");
        assert_eq!(detect_language(Some("es")), "en");
        assert_eq!(detect_language(None), "en");
    }

    #[test]
    fn test_global_helpers() {
        init_localization().unwrap();
        // Idempotent
        init_localization().unwrap();

        assert_eq!(t_lang("menu-faq", Some("en")), "📄 FAQ");
        assert!(t_args_lang("invalid-service-number", &[("max", "3")], Some("en")).contains("between 1 and 3"));
        assert!(t_args_lang("invalid-service-number", &[("max", "3")], Some("fr")).contains('3'));
    }

    #[test]
    fn test_menu_labels_match_in_any_language() {
        init_localization().unwrap();

        assert!(matches_any_language("menu-new-order", "📋 New Order"));
        assert!(matches_any_language("menu-new-order", "📋 Nouvelle commande"));
        assert!(matches_any_language("menu-wallet", "  💼 Wallet "));
        assert!(!matches_any_language("menu-wallet", "Wallet"));
        assert!(!matches_any_language("menu-new-order", "📄 FAQ"));
    }
}
