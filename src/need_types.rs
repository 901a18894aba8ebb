//! # Need Types Module
//!
//! This module defines the core types used for needed-item extraction.

use serde::{Deserialize, Serialize};

/// Half-open character range `[start, end)` into the normalized text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// True when the two ranges share at least one character
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies entirely within this range
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extraction rules, listed in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// `A と B が必要`
    PairedNeed,
    /// Item group, optional particles, trigger word, optional tail
    DirectTrigger,
    /// 購入/用意/準備 followed by a verbal inflection
    SahenVerb,
    /// Like `DirectTrigger` with a short qualifier between items and trigger
    Bridging,
    /// Heading-style list such as `必要: A、B`
    Listing,
    /// Noun token adjacent to the primary trigger in a tokenized text
    TokenAdjacency,
}

/// A raw item candidate produced by the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Character span of the captured item text in the normalized input
    pub span: Span,
    /// The captured text before cleaning
    pub raw_text: String,
    /// Which rule produced this candidate
    pub rule: RuleKind,
    /// The trimmed sentence the candidate was found in
    pub context: String,
    /// Quantity stated between the item and the trigger (`ケーブルを2本用意`)
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

/// An extracted item, ready to be handed to a to-do sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeededItem {
    /// Cleaned item name (e.g. "LANケーブル")
    pub name: String,
    /// Parsed quantity, if the text stated one
    pub quantity: Option<f64>,
    /// Counter or unit attached to the quantity (e.g. "本", "m")
    pub unit: Option<String>,
    /// Source sentence(s) the item was extracted from
    pub note: Option<String>,
}

impl NeededItem {
    /// Create an item with just a name
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            quantity: None,
            unit: None,
            note: None,
        }
    }

    pub fn with_quantity(mut self, quantity: f64, unit: Option<&str>) -> Self {
        self.quantity = Some(quantity);
        self.unit = unit.map(str::to_string);
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// Free-text fields of a report, resolved by the caller from its own schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportText {
    /// Main body, e.g. the work content
    pub primary: String,
    /// Secondary body, e.g. remarks
    pub secondary: String,
}

impl ReportText {
    pub fn new(primary: &str, secondary: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        }
    }

    /// Text handed to the extractor: both fields joined by a newline, trimmed
    pub fn compose(&self) -> String {
        format!("{}\n{}", self.primary, self.secondary)
            .trim()
            .to_string()
    }
}

/// How the aggregator keys merged items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Distinct names only; quantities, units and notes are dropped
    ByName,
    /// Merge on (name, unit), summing quantities and concatenating notes
    ByNameAndUnit,
}

/// What to do with input longer than the configured maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Truncate,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_overlap() {
        let a = Span::new(0, 4);
        assert!(a.overlaps(&Span::new(3, 6)));
        assert!(!a.overlaps(&Span::new(4, 6)));
        assert!(Span::new(2, 3).overlaps(&a));
        assert_eq!(a.len(), 4);
        assert!(a.contains(&Span::new(1, 4)));
        assert!(!a.contains(&Span::new(3, 5)));
    }

    #[test]
    fn test_report_text_compose() {
        let text = ReportText::new("配線作業", "LANケーブルが必要");
        assert_eq!(text.compose(), "配線作業\nLANケーブルが必要");

        let only_note = ReportText::new("", "  予備が必要 ");
        assert_eq!(only_note.compose(), "予備が必要");

        assert_eq!(ReportText::default().compose(), "");
    }
}
