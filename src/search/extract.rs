//! Extractor seam: the contracts an entity/relation extractor fulfils, plus
//! the built-in gazetteer matcher.
//!
//! Natural-language extraction itself lives outside this crate; hosts plug
//! their extractor in through [`ExchangeExtractor`] and [`QueryExtractor`].
//! The [`GazetteerExtractor`] covers the half this crate does own: matching
//! already-known entity names against raw text.

use crate::error::Result;
use crate::graph::{EntityMention, TripleMention};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One raw message of an exchange, as handed to ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeMessage {
    pub role: String,
    pub content: String,
}

impl ExchangeMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Everything an extractor pulls out of one exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extraction {
    pub entities: Vec<EntityMention>,
    pub triples: Vec<TripleMention>,
    /// Raw name pairs observed together in the exchange.
    pub cooccurrences: Vec<(String, String)>,
}

/// Produces the `{entities, triples, cooccurrences}` payload for one
/// completed exchange, given its messages and a sample of known entities.
pub trait ExchangeExtractor: Send + Sync {
    fn extract(&self, messages: &[ExchangeMessage], known: &[EntityMention])
        -> Result<Extraction>;
}

/// Produces entity mentions for a retrieval query.
pub trait QueryExtractor: Send + Sync {
    fn extract_query(&self, text: &str, known: &[EntityMention]) -> Vec<EntityMention>;
}

/// Matches known entity names against text with case-insensitive
/// word-boundary regexes. No discovery of new entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct GazetteerExtractor;

impl GazetteerExtractor {
    /// Whether `name` occurs in `text` as a whole word, ignoring case.
    pub fn mentions(text: &str, name: &str) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name.trim())))
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }

    fn match_known<'a>(
        text: &str,
        known: &'a [EntityMention],
    ) -> impl Iterator<Item = &'a EntityMention> {
        let text = text.to_string();
        known
            .iter()
            .filter(move |mention| Self::mentions(&text, &mention.name))
    }
}

impl QueryExtractor for GazetteerExtractor {
    fn extract_query(&self, text: &str, known: &[EntityMention]) -> Vec<EntityMention> {
        Self::match_known(text, known).cloned().collect()
    }
}

impl ExchangeExtractor for GazetteerExtractor {
    fn extract(
        &self,
        messages: &[ExchangeMessage],
        known: &[EntityMention],
    ) -> Result<Extraction> {
        let text = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let entities: Vec<EntityMention> = Self::match_known(&text, known).cloned().collect();

        let mut cooccurrences = Vec::new();
        for i in 0..entities.len() {
            for j in (i + 1)..entities.len() {
                cooccurrences.push((entities[i].name.clone(), entities[j].name.clone()));
            }
        }

        Ok(Extraction {
            entities,
            triples: Vec::new(),
            cooccurrences,
        })
    }
}

/// Merge two mention lists by case-insensitive name; the first occurrence
/// wins, later duplicates are dropped.
pub fn merge_mentions(
    primary: Vec<EntityMention>,
    secondary: Vec<EntityMention>,
) -> Vec<EntityMention> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for mention in primary.into_iter().chain(secondary) {
        if seen.insert(mention.name.to_lowercase()) {
            merged.push(mention);
        }
    }

    merged
}
