use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use unic_langid::LanguageIdentifier;

/// Languages shipped with the bot, default first
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "fr"];
pub const DEFAULT_LANGUAGE: &str = "en";

fn resource_for(language: &str) -> Option<&'static str> {
    match language {
        "en" => Some(include_str!("../locales/en/main.ftl")),
        "fr" => Some(include_str!("../locales/fr/main.ftl")),
        _ => None,
    }
}

/// Localization manager for the order bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every supported language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for language in SUPPORTED_LANGUAGES {
            let locale: LanguageIdentifier = language.parse()?;
            let bundle = Self::create_bundle(&locale)?;
            bundles.insert(language.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &LanguageIdentifier) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Isolation marks would end up as invisible characters in Telegram messages
        bundle.set_use_isolating(false);

        let language = locale.language.as_str();
        let source = resource_for(language)
            .ok_or_else(|| anyhow!("No resource bundled for language '{language}'"))?;
        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid Fluent resource for '{language}': {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate Fluent messages for '{language}': {errors:?}"))?;

        Ok(bundle)
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message in a specific language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let Some(bundle) = self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        else {
            return format!("Missing translation: {key}");
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None if language != DEFAULT_LANGUAGE => {
                return self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
            }
            None => return format!("Missing translation: {key}"),
        };

        let Some(pattern) = msg.value() else {
            return format!("Missing value for key: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned()
    }

    /// Every supported language's rendering of `key`
    pub fn all_translations(&self, key: &str) -> Vec<String> {
        SUPPORTED_LANGUAGES
            .iter()
            .map(|language| self.get_message_in_language(key, language, None))
            .collect()
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager. Safe to call more than once.
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let manager = LocalizationManager::new()?;
        let _ = LOCALIZATION_MANAGER.set(manager);
    }
    Ok(())
}

/// Get the global localization manager, if initialized
pub fn get_localization_manager() -> Option<&'static LocalizationManager> {
    LOCALIZATION_MANAGER.get()
}

/// Map a Telegram `language_code` (e.g. `fr-CA`) to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    let Some(code) = language_code else {
        return DEFAULT_LANGUAGE;
    };
    let primary = code.split(['-', '_']).next().unwrap_or_default().to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|language| **language == primary)
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Localized message for the user's language code
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    match get_localization_manager() {
        Some(manager) => manager.get_message_in_language(key, detect_language(language_code), None),
        None => key.to_string(),
    }
}

/// Localized message with arguments for the user's language code
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    match get_localization_manager() {
        Some(manager) => {
            let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
            manager.get_message_in_language(key, detect_language(language_code), Some(&args_map))
        }
        None => key.to_string(),
    }
}

/// Whether `text` equals `key` rendered in any supported language
pub fn matches_any_language(key: &str, text: &str) -> bool {
    let text = text.trim();
    match get_localization_manager() {
        Some(manager) => manager.all_translations(key).iter().any(|label| label == text),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundles_parse() {
        let manager = LocalizationManager::new().unwrap();
        for language in SUPPORTED_LANGUAGES {
            assert!(manager.is_language_supported(language));
        }
    }

    #[test]
    fn test_every_english_key_has_french_translation() {
        let en = resource_for("en").unwrap();
        let fr = resource_for("fr").unwrap();
        let keys = |source: &str| -> Vec<String> {
            source
                .lines()
                .filter(|line| !line.starts_with('#') && line.contains(" = "))
                .filter_map(|line| line.split(" = ").next().map(str::to_string))
                .collect()
        };
        let fr_keys = keys(fr);
        for key in keys(en) {
            assert!(fr_keys.contains(&key), "missing French translation for {key}");
        }
    }
}
