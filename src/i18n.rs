use std::collections::HashMap;

use fluent_templates::{fluent_bundle::FluentValue, static_loader, Loader};
use once_cell::sync::Lazy;
use unic_langid::LanguageIdentifier;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "ru",
        // Bidi isolation marks around arguments break links and counters in Telegram.
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Code of the default (and fallback) language.
pub const DEFAULT_LANG_CODE: &str = "ru";

/// Supported languages (code, human-readable name).
pub static SUPPORTED_LANGS: &[(&str, &str)] = &[("ru", "Русский"), ("en", "English")];

/// Default language identifier used as a fallback.
pub static DEFAULT_LANG: Lazy<LanguageIdentifier> = Lazy::new(|| DEFAULT_LANG_CODE.parse().unwrap_or_default());

/// Normalizes a Telegram language code into a LanguageIdentifier.
/// Unsupported languages fall back to Russian.
pub fn lang_from_code(code: &str) -> LanguageIdentifier {
    let normalized = match is_language_supported(code) {
        Some("en") => "en-US",
        _ => DEFAULT_LANG_CODE,
    };

    normalized.parse().unwrap_or_else(|_| DEFAULT_LANG.clone())
}

/// Checks if a language code is supported by the bot.
/// Returns the normalized language code if supported, None otherwise.
pub fn is_language_supported(code: &str) -> Option<&'static str> {
    let normalized = code.split(['-', '_']).next().unwrap_or(code).to_lowercase();

    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(&normalized))
        .map(|(c, _)| *c)
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: &LanguageIdentifier, key: &str) -> String {
    let text = LOCALES
        .lookup(lang, key)
        .unwrap_or_else(|| LOCALES.lookup(&DEFAULT_LANG, key).unwrap_or_else(|| key.to_string()));
    text.replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
///
/// Arguments are passed pre-formatted as strings so numbers render exactly
/// as the caller formatted them.
pub fn t_args(lang: &LanguageIdentifier, key: &str, args: &[(&str, String)]) -> String {
    let args_map: HashMap<String, FluentValue> = args
        .iter()
        .map(|(k, v)| (k.to_string(), FluentValue::from(v.clone())))
        .collect();

    let text = LOCALES.lookup_with_args(lang, key, &args_map).unwrap_or_else(|| {
        LOCALES
            .lookup_with_args(&DEFAULT_LANG, key, &args_map)
            .unwrap_or_else(|| key.to_string())
    });
    text.replace("\\n", "\n")
}

/// Finds a human-friendly name for a language code.
pub fn language_name(code: &str) -> &str {
    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::phishing::Scenario;
    use crate::services::quiz::{list_themes, questions_for_theme};

    #[test]
    fn loads_known_translation() {
        let ru = lang_from_code("ru");
        let en = lang_from_code("en");

        assert_eq!(t(&ru, "password-checking"), "🔍 Проверяю пароль...");
        assert_eq!(t(&en, "password-checking"), "🔍 Checking your password...");
    }

    #[test]
    fn converts_newlines() {
        let ru = lang_from_code("ru");
        let text = t(&ru, "help-text");

        assert!(text.contains('\n'));
        assert!(!text.contains("\\n"));
    }

    #[test]
    fn interpolates_without_isolation_marks() {
        let ru = lang_from_code("ru");
        let text = t_args(
            &ru,
            "phishing-bank_alert-message",
            &[("link", "https://securit-y-check.com/abcd1234".to_string())],
        );
        assert!(text.contains("https://securit-y-check.com/abcd1234"));
        assert!(!text.contains('\u{2068}'));
    }

    #[test]
    fn unknown_language_falls_back_to_russian() {
        assert_eq!(lang_from_code("de").to_string(), "ru");
        assert_eq!(lang_from_code("en-GB").to_string(), "en-US");
        assert_eq!(lang_from_code("EN").to_string(), "en-US");
    }

    #[test]
    fn every_quiz_and_phishing_key_exists_in_both_languages() {
        for code in ["ru", "en"] {
            let lang = lang_from_code(code);
            let mut keys: Vec<String> = Vec::new();
            for theme in list_themes() {
                keys.push(theme.name_key());
                keys.push(theme.recommendation_key());
                for q in questions_for_theme(theme) {
                    keys.push(q.text_key());
                    keys.push(q.explanation_key());
                    keys.extend((0..q.option_count).map(|o| q.option_key(o)));
                }
            }
            for scenario in Scenario::all() {
                keys.push(scenario.title_key());
                keys.push(scenario.signs_key());
                keys.push(scenario.consequence_key());
            }
            for key in keys {
                assert!(LOCALES.lookup(&lang, &key).is_some(), "{code}: missing {key}");
            }
        }
    }

    #[test]
    fn test_is_language_supported() {
        assert_eq!(is_language_supported("en"), Some("en"));
        assert_eq!(is_language_supported("ru-RU"), Some("ru"));
        assert_eq!(is_language_supported("en_US"), Some("en"));
        assert_eq!(is_language_supported("es"), None);
        assert_eq!(language_name("ru"), "Русский");
    }
}
