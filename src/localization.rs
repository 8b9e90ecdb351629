use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

use crate::formulas::CalorieMethod;
use crate::profile::Field;

/// Languages the bot speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Ukrainian,
    Russian,
    German,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Ukrainian,
        Language::Russian,
        Language::German,
    ];

    /// ISO 639-1 code, also the name of the locale directory
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Ukrainian => "uk",
            Language::Russian => "ru",
            Language::German => "de",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|language| language.code() == code)
    }

    /// Name of the language written in that language, for the language keyboard
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Ukrainian => "Українська",
            Language::Russian => "Русский",
            Language::German => "Deutsch",
        }
    }
}

/// Map a Telegram `language_code` (`"en-US"`, `"uk"`, ...) onto a supported language
pub fn detect_language(language_code: Option<&str>) -> Language {
    language_code
        .and_then(|code| code.split(['-', '_']).next())
        .map(|primary| primary.to_ascii_lowercase())
        .and_then(|primary| Language::from_code(&primary))
        .unwrap_or_default()
}

fn missing_translation(key: &str) -> String {
    format!("Missing translation: {key}")
}

/// Localized text lookup used by the flow engine, the report formatter and the handlers
pub trait Localizer: Send + Sync {
    /// Format `key` in `language`, falling back to English; `None` when no bundle has it
    fn lookup(&self, key: &str, language: Language, args: Option<&FluentArgs<'_>>) -> Option<String>;

    fn message(&self, key: &str, language: Language) -> String {
        self.lookup(key, language, None)
            .unwrap_or_else(|| missing_translation(key))
    }

    fn message_with_args(&self, key: &str, language: Language, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(*value));
        }
        self.lookup(key, language, Some(&fluent_args))
            .unwrap_or_else(|| missing_translation(key))
    }

    /// Format `key` with a numeric `$count`, so plural selectors apply
    fn message_with_count(&self, key: &str, language: Language, count: u64) -> String {
        let mut fluent_args = FluentArgs::new();
        fluent_args.set("count", FluentValue::from(count));
        self.lookup(key, language, Some(&fluent_args))
            .unwrap_or_else(|| missing_translation(key))
    }

    fn field_prompt(&self, field: Field, language: Language) -> String {
        self.message(&format!("question-{}", field.key()), language)
    }

    fn field_error(&self, field: Field, language: Language) -> String {
        self.message(&format!("error-{}-invalid", field.key()), language)
    }

    fn field_label(&self, field: Field, language: Language) -> String {
        self.message(&format!("profile-label-{}", field.key()), language)
    }

    fn method_name(&self, method: CalorieMethod, language: Language) -> String {
        self.message(&format!("method-{}-name", method.key()), language)
    }

    fn method_description(&self, method: CalorieMethod, language: Language) -> Option<String> {
        self.lookup(&format!("method-{}-description", method.key()), language, None)
    }
}

/// Localization manager backed by Fluent resources
///
/// Loads `<dir>/<code>/main.ftl` for every [`Language`]. A language whose file is
/// missing or fails to parse still gets an empty bundle and falls back to English.
pub struct LocalizationManager {
    bundles: HashMap<Language, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Load every supported language from `locales_dir`
    pub fn new(locales_dir: impl AsRef<Path>) -> Result<Self> {
        let locales_dir = locales_dir.as_ref();
        let mut bundles = HashMap::new();

        for language in Language::ALL {
            let bundle = Self::create_bundle(locales_dir, language)?;
            bundles.insert(language, bundle);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific language
    fn create_bundle(locales_dir: &Path, language: Language) -> Result<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = language
            .code()
            .parse()
            .with_context(|| format!("Invalid language identifier: {}", language.code()))?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Bidi isolation marks would end up verbatim in Telegram messages
        bundle.set_use_isolating(false);

        let resource_path = locales_dir.join(language.code()).join("main.ftl");
        match fs::read_to_string(&resource_path) {
            Ok(content) => match FluentResource::try_new(content) {
                Ok(resource) => {
                    if let Err(errors) = bundle.add_resource(resource) {
                        warn!(language = language.code(), errors = ?errors, "Overriding Fluent messages ignored");
                    }
                    debug!(language = language.code(), path = %resource_path.display(), "Loaded locale");
                }
                Err((_, errors)) => {
                    warn!(language = language.code(), errors = ?errors, "Failed to parse locale file");
                }
            },
            Err(e) => {
                warn!(language = language.code(), path = %resource_path.display(), error = %e, "Locale file not found");
            }
        }

        Ok(bundle)
    }

    fn format(&self, language: Language, key: &str, args: Option<&FluentArgs<'_>>) -> Option<String> {
        let bundle = self.bundles.get(&language)?;
        let pattern = bundle.get_message(key)?.value()?;

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            debug!(key, language = language.code(), errors = ?errors, "Fluent formatting reported errors");
        }
        Some(value.into_owned())
    }
}

impl Localizer for LocalizationManager {
    fn lookup(&self, key: &str, language: Language, args: Option<&FluentArgs<'_>>) -> Option<String> {
        self.format(language, key, args)
            .or_else(|| self.format(Language::English, key, args))
    }
}
