//! # Morphology Module
//!
//! Token-adjacency extraction on top of a part-of-speech tagger. The tagger
//! itself is a collaborator: anything implementing [`MorphologicalTokenizer`]
//! can be plugged in. Construct it once and share it through an `Arc`,
//! dictionary loading is the expensive part.
//!
//! A noun is reported as needed when it is directly followed by the primary
//! trigger (`ケーブル 必要`) or by `が` and then the trigger (`ケーブル が 必要`).
//! When no tokenizer is configured or it fails, extraction falls back to the
//! rule engine in [`crate::text_processing`].

use crate::aggregation::aggregate;
use crate::extraction_errors::ExtractionError;
use crate::need_types::{Candidate, NeededItem, RuleKind, Span};
use crate::text_processing::{normalize, NeedExtractor};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Leading part-of-speech tag of nouns (IPADIC style, e.g. `名詞,一般,*,*`)
pub const NOUN_TAG: &str = "名詞";

/// Particle allowed between the noun and the trigger
pub const SUBJECT_PARTICLE: &str = "が";

/// One morpheme as produced by a tokenizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub surface: String,
    pub part_of_speech: String,
}

impl Token {
    pub fn new(surface: &str, part_of_speech: &str) -> Self {
        Self {
            surface: surface.to_string(),
            part_of_speech: part_of_speech.to_string(),
        }
    }

    pub fn is_noun(&self) -> bool {
        self.part_of_speech.starts_with(NOUN_TAG)
    }
}

/// Part-of-speech tagger for Japanese text
pub trait MorphologicalTokenizer: Send + Sync {
    /// Split `text` into tokens whose surfaces tile the input in order
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, ExtractionError>;
}

/// Nouns adjacent to `trigger`, with character spans derived from the
/// cumulative surface lengths
pub fn adjacency_candidates(tokens: &[Token], trigger: &str) -> Vec<Candidate> {
    let mut offsets = Vec::with_capacity(tokens.len());
    let mut offset = 0;
    for token in tokens {
        offsets.push(offset);
        offset += token.surface.chars().count();
    }

    let mut candidates = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_noun() || token.surface == trigger {
            continue;
        }

        let window_end = match (tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(next), _) if next.surface == trigger => Some(i + 1),
            (Some(next), Some(after)) if next.surface == SUBJECT_PARTICLE && after.surface == trigger => {
                Some(i + 2)
            }
            _ => None,
        };

        if let Some(end) = window_end {
            let context: String = tokens[i..=end].iter().map(|t| t.surface.as_str()).collect();
            let start = offsets[i];
            candidates.push(Candidate {
                span: Span::new(start, start + token.surface.chars().count()),
                raw_text: token.surface.clone(),
                rule: RuleKind::TokenAdjacency,
                context,
                quantity: None,
                unit: None,
            });
        }
    }
    candidates
}

/// Extractor using a tokenizer when one is available
#[derive(Clone)]
pub struct MorphologicalExtractor {
    tokenizer: Option<Arc<dyn MorphologicalTokenizer>>,
    extractor: NeedExtractor,
}

impl MorphologicalExtractor {
    /// Create an extractor backed by `tokenizer`; `extractor` supplies the
    /// cleaner, the aggregation policy and the fallback rules
    pub fn new(tokenizer: Arc<dyn MorphologicalTokenizer>, extractor: NeedExtractor) -> Self {
        info!("Creating MorphologicalExtractor with tokenizer");
        Self {
            tokenizer: Some(tokenizer),
            extractor,
        }
    }

    /// Create an extractor that always uses the rule engine
    pub fn rules_only(extractor: NeedExtractor) -> Self {
        info!("Creating MorphologicalExtractor without tokenizer, rule engine only");
        Self {
            tokenizer: None,
            extractor,
        }
    }

    pub fn has_tokenizer(&self) -> bool {
        self.tokenizer.is_some()
    }

    pub fn extract(&self, text: &str) -> Result<Vec<NeededItem>, ExtractionError> {
        let Some(tokenizer) = &self.tokenizer else {
            debug!("No tokenizer configured, using rule engine");
            return self.extractor.extract(text);
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let normalized = normalize(text);
        let bounded = self.extractor.bound_input(&normalized)?;
        let tokens = match tokenizer.tokenize(&bounded) {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!("Tokenizer failed ({}), falling back to rule engine", err);
                return self.extractor.extract(text);
            }
        };

        let trigger = &self.extractor.config().vocabulary.primary_trigger;
        let candidates = adjacency_candidates(&tokens, trigger);
        debug!(
            "Token adjacency produced {} candidates from {} tokens",
            candidates.len(),
            tokens.len()
        );

        let items: Vec<NeededItem> = candidates
            .iter()
            .filter_map(|candidate| self.extractor.to_item(candidate))
            .collect();
        Ok(aggregate(items, self.extractor.config().dedup))
    }
}

impl std::fmt::Debug for MorphologicalExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MorphologicalExtractor")
            .field("has_tokenizer", &self.has_tokenizer())
            .field("extractor", &self.extractor)
            .finish()
    }
}
