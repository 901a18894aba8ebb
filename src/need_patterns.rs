//! # Need Patterns Module
//!
//! This module builds the rule table and cleaner patterns from a
//! [`Vocabulary`](crate::need_config::Vocabulary). All character classes are
//! written against NFKC-normalized text, so full-width punctuation such as
//! `！` or `：` only ever appears here in its canonical form.

use crate::extraction_errors::ExtractionError;
use crate::need_config::{ExtractorConfig, Vocabulary};
use crate::need_types::RuleKind;
use lazy_static::lazy_static;
use regex::Regex;

/// Punctuation stripped from the head and tail of a candidate
pub const PUNCTUATION: &str = r#"、。.,!?\-—・:;()\[\]「」『』"'`"#;

/// Characters that end a sentence segment
pub const SEGMENT_TERMINATORS: &str = r"[。!?\n\r]+";

/// Topic/subject markers allowed after the second item of a pair
pub const PAIR_TOPIC_MARKERS: &str = "がは";

/// Inflectional tail accepted after a trigger word, longest first
pub const AFTER_TRIGGER_TAIL: &str =
    "(?:する予定|しておく|します|でした|する|した|して|予定|です|ます|し|だ|で)?";

/// Verbal inflection required after a sahen trigger
pub const SAHEN_TAIL: &str = "(?:する予定|します|する|した|して)";

/// Separators between a list heading and its items
pub const LIST_HEADING_MARKS: &str = r"[:⇒→\-]";

/// Case particles that mark an item as the topic or object of the trigger
pub const ITEM_MARKERS: &str = "がをはも";

/// Characters a bridging qualifier may not span
pub const BRIDGE_GAP_EXCLUDED: &str = r"\s。!?,、";

/// A single prioritized extraction rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    pub pattern: Regex,
}

/// Patterns used by the item cleaner
#[derive(Debug, Clone)]
pub struct CleanerPatterns {
    pub punct_head: Regex,
    pub punct_tail: Regex,
    /// `None` when the vocabulary has no connectives
    pub leading_connective: Option<Regex>,
    pub trigger_any: Regex,
    pub particle: Regex,
    pub particle_head: Regex,
    pub particle_tail: Regex,
}

/// The compiled pattern set an extractor runs with
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Rules in priority order
    pub rules: Vec<Rule>,
    /// Splits an item group into single items
    pub separator: Regex,
    /// Splits text into sentence segments
    pub segment_split: Regex,
    /// Trailing quantity such as `5本` or `×2`
    pub quantity: Regex,
    pub cleaner: CleanerPatterns,
}

lazy_static! {
    pub static ref DEFAULT_RULES: RuleSet = RuleSet::compile(&ExtractorConfig::default())
        .expect("Default need patterns should be valid");
}

/// Escape every character of `chars` for use inside a `[...]` class
pub fn char_class(chars: &str) -> String {
    chars
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect()
}

/// Non-capturing alternation of `words`, longest first so that
/// leftmost-first matching prefers `今日は` over `今日`
pub fn alternation(words: &[String]) -> Option<String> {
    let mut words: Vec<&String> = words.iter().filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    let alts: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Some(format!("(?:{})", alts.join("|")))
}

impl RuleSet {
    /// Compile the rule table for a configuration
    pub fn compile(config: &ExtractorConfig) -> Result<Self, ExtractionError> {
        let vocab = &config.vocabulary;
        if vocab.particles.is_empty() || vocab.separators.is_empty() {
            return Err(ExtractionError::InvalidPattern(
                "particle and separator classes must not be empty".to_string(),
            ));
        }
        let triggers = alternation(&vocab.triggers).ok_or_else(|| {
            ExtractionError::InvalidPattern("trigger vocabulary is empty".to_string())
        })?;

        let particles = char_class(&vocab.particles);
        let separators = char_class(&vocab.separators);
        let item_token = format!(r"[^\s。!?,{separators}{particles}]+");
        let item_group = format!("{item_token}(?:[{separators}]{item_token})*");
        let optional_particles = format!("[{particles}{separators}]*");
        let stated_quantity = quantity_clause(vocab, &optional_particles);

        let mut rules = Vec::new();

        rules.push(Rule {
            kind: RuleKind::PairedNeed,
            pattern: Regex::new(&format!(
                "(?P<a>{item_token}){conj}(?P<b>{item_token})[{topic}]{optional_particles}{primary}{AFTER_TRIGGER_TAIL}",
                conj = regex::escape(&vocab.pair_conjunction),
                topic = char_class(PAIR_TOPIC_MARKERS),
                primary = regex::escape(&vocab.primary_trigger),
            ))?,
        });

        rules.push(Rule {
            kind: RuleKind::DirectTrigger,
            pattern: Regex::new(&format!(
                "(?P<items>{item_group})(?P<link>{optional_particles}){stated_quantity}(?P<trg>{triggers}){AFTER_TRIGGER_TAIL}"
            ))?,
        });

        if let Some(sahen) = alternation(&vocab.sahen_triggers) {
            rules.push(Rule {
                kind: RuleKind::SahenVerb,
                pattern: Regex::new(&format!(
                    "(?P<items>{item_group}){optional_particles}{stated_quantity}(?P<trg>{sahen}){optional_particles}{SAHEN_TAIL}"
                ))?,
            });
        }

        rules.push(Rule {
            kind: RuleKind::Bridging,
            pattern: Regex::new(&format!(
                r"(?P<items>{item_group})[{markers}]{optional_particles}(?P<gap>[^{BRIDGE_GAP_EXCLUDED}]{{0,{gap}}}?)(?P<trg>{triggers}){AFTER_TRIGGER_TAIL}",
                markers = char_class(ITEM_MARKERS),
                gap = config.bridge_max_gap,
            ))?,
        });

        if let Some(headers) = alternation(&vocab.list_headers) {
            rules.push(Rule {
                kind: RuleKind::Listing,
                pattern: Regex::new(&format!(
                    r"{headers}\s*{LIST_HEADING_MARKS}\s*(?P<items>{item_group})"
                ))?,
            });
        }

        Ok(Self {
            rules,
            separator: Regex::new(&format!("[{separators}]"))?,
            segment_split: Regex::new(SEGMENT_TERMINATORS)?,
            quantity: Regex::new(&quantity_pattern(vocab))?,
            cleaner: CleanerPatterns::compile(vocab, &triggers)?,
        })
    }

    pub fn rule(&self, kind: RuleKind) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.kind == kind)
    }
}

impl CleanerPatterns {
    fn compile(vocab: &Vocabulary, triggers: &str) -> Result<Self, ExtractionError> {
        let particles = char_class(&vocab.particles);
        let leading_connective = match alternation(&vocab.leading_connectives) {
            Some(alts) => Some(Regex::new(&format!("^{alts}"))?),
            None => None,
        };

        Ok(Self {
            punct_head: Regex::new(&format!("^[{PUNCTUATION}]+"))?,
            punct_tail: Regex::new(&format!("[{PUNCTUATION}]+$"))?,
            leading_connective,
            trigger_any: Regex::new(triggers)?,
            particle: Regex::new(&format!("[{particles}]"))?,
            particle_head: Regex::new(&format!("^[{particles}]"))?,
            particle_tail: Regex::new(&format!("[{particles}]$"))?,
        })
    }
}

/// Optional `2本` between the particles and the trigger, as in `ケーブルを2本用意`
fn quantity_clause(vocab: &Vocabulary, optional_particles: &str) -> String {
    let units = alternation(&vocab.units)
        .map(|alts| format!("(?P<unit>{alts})?"))
        .unwrap_or_default();
    format!(r"(?:(?P<qty>[0-9]+(?:\.[0-9]+)?)\s*{units}{optional_particles})?")
}

fn quantity_pattern(vocab: &Vocabulary) -> String {
    let units = alternation(&vocab.units)
        .map(|alts| format!("(?P<unit>{alts})?"))
        .unwrap_or_default();
    format!(r"(?P<marker>[×xX*]\s*)?(?P<qty>[0-9]+(?:\.[0-9]+)?)\s*{units}$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_compile_in_priority_order() {
        let kinds: Vec<RuleKind> = DEFAULT_RULES.rules.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RuleKind::PairedNeed,
                RuleKind::DirectTrigger,
                RuleKind::SahenVerb,
                RuleKind::Bridging,
                RuleKind::Listing,
            ]
        );
    }

    #[test]
    fn test_alternation_prefers_longer_words() {
        let words = vec!["今日".to_string(), "今日は".to_string(), String::new()];
        assert_eq!(alternation(&words).unwrap(), "(?:今日は|今日)");
        assert!(alternation(&[]).is_none());
    }

    #[test]
    fn test_char_class_escapes_metacharacters() {
        let class = format!("[{}]", char_class("-]^"));
        let re = Regex::new(&class).unwrap();
        assert!(re.is_match("-"));
        assert!(re.is_match("]"));
        assert!(re.is_match("^"));
        assert!(!re.is_match("a"));
    }

    #[test]
    fn test_direct_rule_captures_item_group() {
        let rule = DEFAULT_RULES.rule(RuleKind::DirectTrigger).unwrap();
        let caps = rule.pattern.captures("ケーブルとテスターを用意する").unwrap();
        assert_eq!(&caps["items"], "ケーブルとテスター");
        assert_eq!(&caps["trg"], "用意");
        assert_eq!(&caps["link"], "を");
    }

    #[test]
    fn test_direct_rule_captures_stated_quantity() {
        let rule = DEFAULT_RULES.rule(RuleKind::DirectTrigger).unwrap();
        let caps = rule.pattern.captures("LANケーブルを2本用意").unwrap();
        assert_eq!(&caps["items"], "LANケーブル");
        assert_eq!(&caps["qty"], "2");
        assert_eq!(&caps["unit"], "本");
    }

    #[test]
    fn test_paired_rule() {
        let rule = DEFAULT_RULES.rule(RuleKind::PairedNeed).unwrap();
        let caps = rule.pattern.captures("HDMIケーブルとUSBメモリが必要").unwrap();
        assert_eq!(&caps["a"], "HDMIケーブル");
        assert_eq!(&caps["b"], "USBメモリ");
        assert!(!rule.pattern.is_match("HDMIケーブルとUSBメモリを購入"));
    }

    #[test]
    fn test_sahen_rule_requires_inflection() {
        let rule = DEFAULT_RULES.rule(RuleKind::SahenVerb).unwrap();
        assert!(rule.pattern.is_match("工具を購入する"));
        assert!(!rule.pattern.is_match("工具を購入"));
    }

    #[test]
    fn test_bridging_rule_tolerates_qualifier() {
        let rule = DEFAULT_RULES.rule(RuleKind::Bridging).unwrap();
        let caps = rule.pattern.captures("部材は週末までに手配").unwrap();
        assert_eq!(&caps["items"], "部材");
        assert_eq!(&caps["gap"], "週末までに");

        // Shortest qualifier wins, and it never crosses a comma
        let caps = rule.pattern.captures("脚立は念のため用意、テスターも必要").unwrap();
        assert_eq!(&caps["gap"], "念のため");
        assert!(!rule.pattern.is_match("脚立は念のため、必要"));

        // An attributive の does not start a bridge
        assert!(rule
            .pattern
            .captures("交換用のファンを購入")
            .map_or(true, |caps| &caps["items"] != "交換用"));
    }

    #[test]
    fn test_listing_rule() {
        let rule = DEFAULT_RULES.rule(RuleKind::Listing).unwrap();
        let caps = rule.pattern.captures("必要: 脚立、養生テープ").unwrap();
        assert_eq!(&caps["items"], "脚立、養生テープ");
    }

    #[test]
    fn test_quantity_pattern() {
        let caps = DEFAULT_RULES.quantity.captures("LANケーブル5本").unwrap();
        assert_eq!(&caps["qty"], "5");
        assert_eq!(caps.name("unit").map(|m| m.as_str()), Some("本"));

        let caps = DEFAULT_RULES.quantity.captures("ケーブル×2.5m").unwrap();
        assert_eq!(&caps["qty"], "2.5");
        assert_eq!(caps.name("unit").map(|m| m.as_str()), Some("m"));
        assert!(caps.name("marker").is_some());

        assert!(DEFAULT_RULES.quantity.captures("ケーブル").is_none());
    }

    #[test]
    fn test_empty_trigger_vocabulary_is_rejected() {
        let mut config = ExtractorConfig::default();
        config.vocabulary.triggers.clear();
        assert!(matches!(
            RuleSet::compile(&config),
            Err(ExtractionError::InvalidPattern(_))
        ));
    }
}
