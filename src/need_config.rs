//! # Extractor Configuration Module
//!
//! This module defines the vocabulary and limits the extractor is built from,
//! plus the settings of the report autofill hook. Every value has a default;
//! environment variables override them at startup.

use crate::need_types::{DedupPolicy, OverflowPolicy};
use log::{debug, warn};
use std::collections::HashSet;
use std::env;

// Constants for extractor configuration
pub const DEFAULT_MAX_INPUT_CHARS: usize = 50_000;
pub const DEFAULT_BRIDGE_MAX_GAP: usize = 30;
pub const DEFAULT_LOCALE: &str = "ja";

pub const DEFAULT_TRIGGERS: &[&str] = &["必要", "用意", "準備", "購入", "手配", "いる", "要る"];
pub const DEFAULT_SAHEN_TRIGGERS: &[&str] = &["購入", "用意", "準備"];
pub const DEFAULT_PARTICLES: &str = "がをはもにへでの";
pub const DEFAULT_SEPARATORS: &str = "とや、,";
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "今日", "きょう", "今日は", "きょうは", "明日", "あした", "明後日", "あさって", "あと",
    "それから", "さらに", "追加で", "予定", "以上", "等", "など",
];
pub const DEFAULT_LEADING_CONNECTIVES: &[&str] = &[
    "今日は", "きょうは", "今日", "きょう", "明後日", "あさって", "明日", "あした", "あと",
    "それから", "さらに", "追加で",
];
pub const DEFAULT_LIST_HEADERS: &[&str] = &["必要", "要品", "Required"];
pub const DEFAULT_UNITS: &[&str] = &[
    "個", "枚", "本", "台", "m", "メートル", "箱", "セット", "式", "袋", "巻", "本体", "枚組",
];

/// Word lists and character classes the rule table is compiled from
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Need-trigger words (必要, 用意, ...)
    pub triggers: Vec<String>,
    /// Triggers that take a verbal inflection in the sahen-verb rule
    pub sahen_triggers: Vec<String>,
    /// Trigger used by the paired rule and the token-adjacency variant
    pub primary_trigger: String,
    /// Conjunction joining the two items of the paired rule
    pub pair_conjunction: String,
    /// Grammatical particles, one per character
    pub particles: String,
    /// Item separators (and/or/comma), one per character
    pub separators: String,
    /// Names that are never items
    pub stopwords: HashSet<String>,
    /// Adverbial lead-ins stripped from the head of a candidate
    pub leading_connectives: Vec<String>,
    /// Headings introducing a list of needed items
    pub list_headers: Vec<String>,
    /// Counters recognised after a quantity
    pub units: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Self {
            triggers: owned(DEFAULT_TRIGGERS),
            sahen_triggers: owned(DEFAULT_SAHEN_TRIGGERS),
            primary_trigger: "必要".to_string(),
            pair_conjunction: "と".to_string(),
            particles: DEFAULT_PARTICLES.to_string(),
            separators: DEFAULT_SEPARATORS.to_string(),
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect(),
            leading_connectives: owned(DEFAULT_LEADING_CONNECTIVES),
            list_headers: owned(DEFAULT_LIST_HEADERS),
            units: owned(DEFAULT_UNITS),
        }
    }
}

/// Configuration structure for the needed-item extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Vocabulary the patterns are built from
    pub vocabulary: Vocabulary,
    /// Maximum accepted input length in characters
    pub max_input_chars: usize,
    /// Behaviour when the input is longer than `max_input_chars`
    pub overflow: OverflowPolicy,
    /// Maximum characters the bridging rule tolerates before the trigger
    pub bridge_max_gap: usize,
    /// Aggregation key
    pub dedup: DedupPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::default(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            overflow: OverflowPolicy::Truncate,
            bridge_max_gap: DEFAULT_BRIDGE_MAX_GAP,
            dedup: DedupPolicy::ByNameAndUnit,
        }
    }
}

impl ExtractorConfig {
    /// Build a configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_vars<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = get("NEEDS_MAX_INPUT_CHARS") {
            match raw.trim().parse::<usize>() {
                Ok(max) if max > 0 => config.max_input_chars = max,
                _ => warn!("Ignoring invalid NEEDS_MAX_INPUT_CHARS value: '{}'", raw),
            }
        }

        if let Some(raw) = get("NEEDS_BRIDGE_MAX_GAP") {
            match raw.trim().parse::<usize>() {
                Ok(gap) => config.bridge_max_gap = gap,
                Err(_) => warn!("Ignoring invalid NEEDS_BRIDGE_MAX_GAP value: '{}'", raw),
            }
        }

        if let Some(raw) = get("NEEDS_OVERFLOW") {
            match raw.trim().to_lowercase().as_str() {
                "reject" => config.overflow = OverflowPolicy::Reject,
                "truncate" => config.overflow = OverflowPolicy::Truncate,
                _ => warn!("Ignoring invalid NEEDS_OVERFLOW value: '{}'", raw),
            }
        }

        if let Some(raw) = get("NEEDS_DEDUP") {
            match raw.trim().to_lowercase().as_str() {
                "name" => config.dedup = DedupPolicy::ByName,
                "name_unit" => config.dedup = DedupPolicy::ByNameAndUnit,
                _ => warn!("Ignoring invalid NEEDS_DEDUP value: '{}'", raw),
            }
        }

        debug!(
            "Extractor config: max_input_chars={}, overflow={:?}, bridge_max_gap={}, dedup={:?}",
            config.max_input_chars, config.overflow, config.bridge_max_gap, config.dedup
        );
        config
    }
}

/// Persistence policy of the autofill hook; must match the dedup policy in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillPolicy {
    /// One to-do per report and assignee, replaced on every save
    ReplaceBatch,
    /// One record per (report, name, unit), quantities accumulated
    UpsertByKey,
}

/// Settings of the report autofill hook
#[derive(Debug, Clone)]
pub struct AutofillSettings {
    /// Master switch (`REQUIREMENTS_AUTOFILL`)
    pub enabled: bool,
    pub policy: AutofillPolicy,
    /// Locale of generated titles and notes
    pub locale: String,
}

impl Default for AutofillSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: AutofillPolicy::ReplaceBatch,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl AutofillSettings {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = get("REQUIREMENTS_AUTOFILL") {
            settings.enabled = is_truthy(&raw);
        }

        if let Some(raw) = get("NEEDS_AUTOFILL_POLICY") {
            match raw.trim().to_lowercase().as_str() {
                "batch" => settings.policy = AutofillPolicy::ReplaceBatch,
                "upsert" => settings.policy = AutofillPolicy::UpsertByKey,
                _ => warn!("Ignoring invalid NEEDS_AUTOFILL_POLICY value: '{}'", raw),
            }
        }

        if let Some(raw) = get("NEEDS_LOCALE") {
            let locale = raw.trim().to_lowercase();
            if locale.is_empty() {
                warn!("Ignoring empty NEEDS_LOCALE");
            } else {
                settings.locale = locale;
            }
        }

        settings
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
