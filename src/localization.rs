use anyhow::{Context, Result};
use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::Arc;
use unic_langid::LanguageIdentifier;

/// Language used when the requested one is not available
pub const DEFAULT_LANGUAGE: &str = "ja";

/// Languages shipped with the crate
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["ja", "en"];

const JA_RESOURCE: &str = include_str!("../locales/ja/main.ftl");
const EN_RESOURCE: &str = include_str!("../locales/en/main.ftl");

/// Localization manager for to-do titles, lines and notes
pub struct LocalizationManager {
    bundles: HashMap<String, Arc<FluentBundle<FluentResource>>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every supported language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (language, source) in [("ja", JA_RESOURCE), ("en", EN_RESOURCE)] {
            let locale: LanguageIdentifier = language
                .parse()
                .with_context(|| format!("Invalid language identifier: {}", language))?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(language.to_string(), Arc::new(bundle));
        }

        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new(vec![locale.clone()]);
        // Titles end up in plain-text to-do fields, no bidi isolation marks
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid FTL for {}: {:?}", locale, errors))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate messages for {}: {:?}", locale, errors))?;

        Ok(bundle)
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message, falling back to the default language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let fluent_args = args.map(|args| {
            FluentArgs::from_iter(args.iter().map(|(k, v)| (*k, FluentValue::from(*v))))
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            log::debug!("Formatting '{}' in '{}' reported {:?}", key, language, errors);
        }
        value.into_owned()
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, key: &str, language: &str, args: &[(&str, &str)]) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language, Some(&args_map))
    }
}

/// Map a locale tag such as `ja-JP` to a supported language
pub fn detect_language(locale: Option<&str>) -> &'static str {
    let Some(locale) = locale else {
        return DEFAULT_LANGUAGE;
    };
    let primary = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| **lang == primary)
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}
