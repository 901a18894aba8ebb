//! # Text Processing Module
//!
//! This module provides the needed-item extractor used to pre-fill to-do
//! lists from free-form Japanese work reports.
//!
//! ## Features
//!
//! - NFKC normalization so full-width and half-width forms match the same patterns
//! - Prioritized rule table (paired, direct, sahen-verb, bridging, listing) with
//!   span claiming so one stretch of text is never counted twice
//! - Particle-aware cleanup of captured noun phrases and stopword filtering
//! - Quantity and unit capture (`LANケーブル5本`, `ケーブルを2本用意`)
//! - Aggregation by name or by (name, unit) with quantity summing

use crate::aggregation::aggregate;
use crate::extraction_errors::ExtractionError;
use crate::need_config::ExtractorConfig;
use crate::need_patterns::{RuleSet, DEFAULT_RULES, ITEM_MARKERS};
use crate::need_types::{Candidate, NeededItem, OverflowPolicy, RuleKind, Span};
use lazy_static::lazy_static;
use log::{debug, info, trace, warn};
use regex::Captures;
use std::borrow::Cow;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Bullet and connector characters trimmed before any other cleanup
const CONNECTOR_CHARS: &str = "・-_/+";

lazy_static! {
    static ref DEFAULT_EXTRACTOR: NeedExtractor = NeedExtractor::new();
}

/// A candidate holding its span, and whether a bridging match may replace it
struct Claim {
    candidate: Candidate,
    /// Direct-trigger item with no が/を/は/も before the trigger
    qualifier: bool,
}

/// Rule-based extractor for items stated as needed in a report
#[derive(Debug, Clone)]
pub struct NeedExtractor {
    rules: RuleSet,
    config: ExtractorConfig,
}

/// Apply NFKC compatibility normalization
///
/// # Examples
///
/// ```rust
/// use needed_items::text_processing::normalize;
///
/// assert_eq!(normalize("ＬＡＮケーブル１０ｍ！"), "LANケーブル10m!");
/// ```
pub fn normalize(text: &str) -> String {
    text.nfkc().collect()
}

/// True for characters in the CJK unified ideograph blocks
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

/// Extract needed items with the default configuration
///
/// Never fails: over-length input is truncated and any error degrades to an
/// empty list. Output order is unspecified.
///
/// # Examples
///
/// ```rust
/// use needed_items::text_processing::extract_needed_items;
///
/// let items = extract_needed_items("LANケーブルが必要です");
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].name, "LANケーブル");
/// assert!(extract_needed_items("").is_empty());
/// ```
pub fn extract_needed_items(text: &str) -> Vec<NeededItem> {
    DEFAULT_EXTRACTOR.extract(text).unwrap_or_else(|err| {
        warn!("Needed-item extraction failed, returning no items: {}", err);
        Vec::new()
    })
}

fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

impl NeedExtractor {
    /// Create an extractor with the default vocabulary and limits
    pub fn new() -> Self {
        info!("Creating new NeedExtractor with default configuration");
        Self {
            rules: DEFAULT_RULES.clone(),
            config: ExtractorConfig::default(),
        }
    }

    /// Create an extractor from a custom configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use needed_items::need_config::ExtractorConfig;
    /// use needed_items::text_processing::NeedExtractor;
    ///
    /// let mut config = ExtractorConfig::default();
    /// config.vocabulary.triggers.push("持参".to_string());
    /// let extractor = NeedExtractor::with_config(config)?;
    /// let names = extractor.extract_names("脚立を持参")?;
    /// assert!(names.contains("脚立"));
    /// # Ok::<(), needed_items::extraction_errors::ExtractionError>(())
    /// ```
    pub fn with_config(config: ExtractorConfig) -> Result<Self, ExtractionError> {
        let rules = RuleSet::compile(&config)?;
        info!(
            "Creating NeedExtractor with custom config: {} triggers, {} stopwords, max_input_chars={}, dedup={:?}",
            config.vocabulary.triggers.len(),
            config.vocabulary.stopwords.len(),
            config.max_input_chars,
            config.dedup
        );
        Ok(Self { rules, config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Extract needed items from raw report text
    ///
    /// Empty or whitespace-only input yields an empty list. Input longer
    /// than `max_input_chars` is truncated or rejected per the overflow policy.
    pub fn extract(&self, text: &str) -> Result<Vec<NeededItem>, ExtractionError> {
        if text.trim().is_empty() {
            trace!("Empty input, nothing to extract");
            return Ok(Vec::new());
        }

        let normalized = normalize(text);
        let bounded = self.bound_input(&normalized)?;
        let candidates = self.match_candidates(&bounded);
        let items: Vec<NeededItem> = candidates
            .iter()
            .filter_map(|candidate| self.to_item(candidate))
            .collect();
        let merged = aggregate(items, self.config.dedup);

        info!(
            "Extracted {} needed items from {} candidates",
            merged.len(),
            candidates.len()
        );
        Ok(merged)
    }

    /// Extract the set of distinct item names
    pub fn extract_names(&self, text: &str) -> Result<HashSet<String>, ExtractionError> {
        Ok(self.extract(text)?.into_iter().map(|item| item.name).collect())
    }

    /// Enforce the input length limit
    ///
    /// Apply it to normalized text: NFKC can expand a character (`㍿` becomes
    /// `株式会社`), so the raw length understates what the matcher scans.
    pub fn bound_input<'a>(&self, text: &'a str) -> Result<Cow<'a, str>, ExtractionError> {
        let max = self.config.max_input_chars;
        let chars = text.chars().count();
        if chars <= max {
            return Ok(Cow::Borrowed(text));
        }

        match self.config.overflow {
            OverflowPolicy::Reject => Err(ExtractionError::InputTooLarge { chars, max }),
            OverflowPolicy::Truncate => {
                warn!(
                    "Input truncated due to length limit ({} > {} characters)",
                    chars, max
                );
                Ok(Cow::Owned(text.chars().take(max).collect()))
            }
        }
    }

    /// Split normalized text into sentence segments with their byte offsets
    pub fn segments<'t>(&self, text: &'t str) -> Vec<(usize, &'t str)> {
        let mut segments = Vec::new();
        let mut start = 0;
        for terminator in self.rules.segment_split.find_iter(text) {
            if terminator.start() > start {
                segments.push((start, &text[start..terminator.start()]));
            }
            start = terminator.end();
        }
        if start < text.len() {
            segments.push((start, &text[start..]));
        }
        segments
    }

    /// Run the rule table over normalized text
    ///
    /// Rules are tried in priority order inside each segment. Only item
    /// spans that survive cleaning are claimed; a match whose items all
    /// clean away claims nothing. A match with an item overlapping a claimed
    /// span is skipped, so the returned candidates never share characters.
    ///
    /// A bridging match replaces direct-trigger items found inside its
    /// qualifier (`部材は週末までに手配` drops `週末ま` for `部材`), unless
    /// one of them was marked as the trigger's object with が/を/は/も.
    pub fn match_candidates(&self, normalized: &str) -> Vec<Candidate> {
        let mut claims: Vec<Claim> = Vec::new();

        for (segment_start, segment) in self.segments(normalized) {
            let context = segment.trim();
            if context.is_empty() {
                continue;
            }
            trace!("Scanning segment at byte {}: '{}'", segment_start, context);

            for rule in &self.rules.rules {
                for caps in rule.pattern.captures_iter(segment) {
                    let matched = caps.get(0).map_or("", |m| m.as_str());
                    let found: Vec<Candidate> = self
                        .candidates_from_match(rule.kind, &caps, normalized, segment_start, context)
                        .into_iter()
                        .filter(|candidate| self.to_item(candidate).is_some())
                        .collect();
                    if found.is_empty() {
                        trace!("{:?} match '{}' cleaned away, nothing claimed", rule.kind, matched);
                        continue;
                    }
                    if found
                        .iter()
                        .any(|c| claims.iter().any(|claim| claim.candidate.span.overlaps(&c.span)))
                    {
                        trace!("{:?} match '{}' overlaps a claimed span, skipping", rule.kind, matched);
                        continue;
                    }

                    if rule.kind == RuleKind::Bridging {
                        let Some(gap) = caps.name("gap") else {
                            continue;
                        };
                        let gap_span = Span::new(
                            char_offset(normalized, segment_start + gap.start()),
                            char_offset(normalized, segment_start + gap.end()),
                        );
                        let inside: Vec<usize> = claims
                            .iter()
                            .enumerate()
                            .filter(|(_, claim)| gap_span.contains(&claim.candidate.span))
                            .map(|(i, _)| i)
                            .collect();
                        if inside.iter().any(|&i| !claims[i].qualifier) {
                            trace!("Bridging match '{}' spans a marked item, skipping", matched);
                            continue;
                        }
                        for i in inside.into_iter().rev() {
                            let dropped = claims.remove(i);
                            debug!(
                                "Bridging match '{}' replaces qualifier '{}'",
                                matched, dropped.candidate.raw_text
                            );
                        }
                    }

                    let qualifier = rule.kind == RuleKind::DirectTrigger
                        && caps
                            .name("link")
                            .map_or(true, |link| !link.as_str().contains(|c: char| ITEM_MARKERS.contains(c)));
                    debug!("{:?} matched '{}', {} items", rule.kind, matched, found.len());
                    claims.extend(found.into_iter().map(|candidate| Claim { candidate, qualifier }));
                }
            }
        }

        debug!("Matcher produced {} candidates", claims.len());
        claims.into_iter().map(|claim| claim.candidate).collect()
    }

    fn candidates_from_match(
        &self,
        kind: RuleKind,
        caps: &Captures<'_>,
        normalized: &str,
        segment_start: usize,
        context: &str,
    ) -> Vec<Candidate> {
        let make = |start: usize, end: usize| Candidate {
            span: Span::new(
                char_offset(normalized, segment_start + start),
                char_offset(normalized, segment_start + end),
            ),
            raw_text: normalized[segment_start + start..segment_start + end].to_string(),
            rule: kind,
            context: context.to_string(),
            quantity: None,
            unit: None,
        };

        if kind == RuleKind::PairedNeed {
            return ["a", "b"]
                .iter()
                .filter_map(|group| caps.name(group))
                .map(|m| make(m.start(), m.end()))
                .collect();
        }

        let Some(items) = caps.name("items") else {
            return Vec::new();
        };
        let pieces = self.split_items(items.as_str());
        let stated_quantity = caps
            .name("qty")
            .and_then(|m| m.as_str().parse::<f64>().ok());
        let stated_unit = caps.name("unit").map(|m| m.as_str().to_string());

        let single = pieces.len() == 1;
        pieces
            .into_iter()
            .map(|(start, end)| {
                let mut candidate = make(items.start() + start, items.start() + end);
                if single {
                    candidate.quantity = stated_quantity;
                    candidate.unit = stated_unit.clone();
                }
                candidate
            })
            .collect()
    }

    /// Byte ranges of the items in an item group, separators excluded
    fn split_items(&self, group: &str) -> Vec<(usize, usize)> {
        let mut pieces = Vec::new();
        let mut start = 0;
        for separator in self.rules.separator.find_iter(group) {
            pieces.push((start, separator.start()));
            start = separator.end();
        }
        pieces.push((start, group.len()));
        pieces.retain(|(start, end)| end > start);
        pieces
    }

    /// Clean one captured item, returning `None` when it is noise
    ///
    /// # Examples
    ///
    /// ```rust
    /// use needed_items::text_processing::NeedExtractor;
    ///
    /// let extractor = NeedExtractor::new();
    /// assert_eq!(extractor.clean_item("「予備バッテリー」"), Some("予備バッテリー".to_string()));
    /// assert_eq!(extractor.clean_item("今日"), None);
    /// assert_eq!(extractor.clean_item("網"), Some("網".to_string()));
    /// assert_eq!(extractor.clean_item("n"), None);
    /// ```
    pub fn clean_item(&self, raw: &str) -> Option<String> {
        let patterns = &self.rules.cleaner;

        let mut name = raw
            .trim_matches(|c: char| c.is_whitespace() || CONNECTOR_CHARS.contains(c))
            .to_string();
        if name.is_empty() {
            trace!("Rejected empty candidate '{}'", raw);
            return None;
        }

        name = self.strip_punctuation(&name);

        if let Some(connective) = &patterns.leading_connective {
            name = connective.replace(&name, "").trim().to_string();
        }

        name = patterns.trigger_any.replace_all(&name, "").into_owned();

        if patterns.particle.is_match(&name) {
            name = self.choose_by_particles(&name);
        }

        name = self.strip_punctuation(&name);
        name = patterns.particle_head.replace(&name, "").into_owned();
        name = patterns.particle_tail.replace(&name, "").trim().to_string();

        if self.is_rejected(&name) {
            trace!("Rejected candidate '{}' (cleaned to '{}')", raw, name);
            return None;
        }

        trace!("Cleaned candidate '{}' -> '{}'", raw, name);
        Some(name)
    }

    fn strip_punctuation(&self, text: &str) -> String {
        let patterns = &self.rules.cleaner;
        let head = patterns.punct_head.replace(text.trim(), "");
        patterns.punct_tail.replace(&head, "").trim().to_string()
    }

    /// Pick between the first and last particle-separated fragments
    ///
    /// The longer fragment wins and ties go to the first one. This is a
    /// heuristic: it assumes an over-captured clause keeps the item name in
    /// its longest fragment.
    fn choose_by_particles(&self, text: &str) -> String {
        let patterns = &self.rules.cleaner;
        let parts: Vec<String> = patterns
            .particle
            .split(text)
            .map(|part| patterns.trigger_any.replace_all(part, "").trim().to_string())
            .filter(|part| !part.is_empty())
            .collect();

        match (parts.first(), parts.last()) {
            (Some(first), Some(last)) => {
                if first.chars().count() >= last.chars().count() {
                    first.clone()
                } else {
                    last.clone()
                }
            }
            _ => text.to_string(),
        }
    }

    fn is_rejected(&self, name: &str) -> bool {
        if name.is_empty() || self.config.vocabulary.stopwords.contains(name) {
            return true;
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(only), None) => !is_cjk_ideograph(only),
            _ => false,
        }
    }

    /// Peel a trailing quantity off a cleaned name
    ///
    /// Returns the remaining name, the quantity and the unit. Digits glued
    /// to ASCII letters (`USB3.0`, `Cat6`) stay part of the name unless a
    /// `×`/`*` marker or a non-ASCII counter makes the quantity explicit.
    pub fn split_quantity(&self, name: &str) -> Option<(String, f64, Option<String>)> {
        let caps = self.rules.quantity.captures(name)?;
        let whole = caps.get(0)?;
        let quantity: f64 = caps.name("qty")?.as_str().parse().ok()?;
        let unit = caps.name("unit").map(|m| m.as_str().to_string());
        let marker = caps.name("marker").map(|m| m.as_str().trim());
        let rest = &name[..whole.start()];

        if rest.chars().last().is_some_and(|c| c.is_ascii_alphanumeric()) {
            let explicit_marker = matches!(marker, Some("×") | Some("*"));
            let counter_unit = unit.as_deref().is_some_and(|u| !u.is_ascii());
            if !explicit_marker && !counter_unit {
                trace!("Keeping digits of '{}' as part of the name", name);
                return None;
            }
        }

        Some((rest.trim().to_string(), quantity, unit))
    }

    /// Turn a raw candidate into a cleaned item
    pub fn to_item(&self, candidate: &Candidate) -> Option<NeededItem> {
        let cleaned = self.clean_item(&candidate.raw_text)?;

        let mut item = match self.split_quantity(&cleaned) {
            Some((rest, quantity, unit)) => {
                let name = self.clean_item(&rest)?;
                NeededItem::named(&name).with_quantity(quantity, unit.as_deref())
            }
            None => match candidate.quantity {
                Some(quantity) => NeededItem::named(&cleaned)
                    .with_quantity(quantity, candidate.unit.as_deref()),
                None => NeededItem::named(&cleaned),
            },
        };

        if !candidate.context.is_empty() {
            item.note = Some(candidate.context.clone());
        }
        Some(item)
    }
}

impl Default for NeedExtractor {
    fn default() -> Self {
        Self::new()
    }
}
