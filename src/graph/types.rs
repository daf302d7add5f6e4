//! Core types for the knowledge graph: entities, triples, co-occurrences,
//! and the typed inputs the store accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Agent id used when the caller does not specify one.
pub const DEFAULT_AGENT_ID: &str = "main";

/// Default per-scan cap for triple lookups.
pub const DEFAULT_TRIPLE_LIMIT: usize = 50;

/// Default cap for co-occurrence lookups.
pub const DEFAULT_COOCCURRENCE_LIMIT: usize = 20;

/// Default cap for prefix searches over entity names.
pub const DEFAULT_PREFIX_LIMIT: usize = 10;

/// Normalize an entity name into its stable id.
///
/// Lowercases and trims the name and collapses internal whitespace runs to
/// a single underscore. Two raw names that normalize identically refer to
/// the same entity. Pure and total; idempotent.
pub fn normalize_entity_id(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Today's UTC calendar date as `YYYY-MM-DD`.
pub(crate) fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// A canonicalized named thing referenced by triples.
///
/// The id is derived from the canonical name via [`normalize_entity_id`],
/// never randomly generated. Entities are scoped by agent: the same canonical
/// name under two agents is two independent rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub canonical_name: String,
    pub entity_type: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Always >= 1; incremented on every upsert, never decremented.
    pub mention_count: u64,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    pub agent_id: String,
}

/// A directed labeled fact between two entities.
///
/// `subject` and `object` hold normalized entity ids, not raw text. A fact is
/// unique per (subject, predicate, object, agent); conflicting writes
/// accumulate confidence instead of duplicating rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triple {
    pub id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_exchange_id: Option<String>,
    /// UTC calendar date (`YYYY-MM-DD`) the fact was sourced on.
    pub source_date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub agent_id: String,
    /// Reserved for a future entity-resolution pass; stored, never interpreted.
    pub pending_resolution: bool,
}

/// Input for [`GraphStore::add_triple`](crate::graph::GraphStore::add_triple).
#[derive(Debug, Clone)]
pub struct TripleInput {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    pub source_exchange_id: Option<String>,
    pub source_date: Option<String>,
    pub agent_id: String,
    pub pending_resolution: bool,
}

impl TripleInput {
    /// Create an input with defaults: confidence 1.0, agent `"main"`,
    /// no exchange attribution, source date filled in at insert time.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: 1.0,
            source_exchange_id: None,
            source_date: None,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            pending_resolution: false,
        }
    }

    /// Set the confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Attribute the fact to a source exchange.
    pub fn with_exchange(mut self, exchange_id: impl Into<String>) -> Self {
        self.source_exchange_id = Some(exchange_id.into());
        self
    }

    /// Set the source date (`YYYY-MM-DD`).
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.source_date = Some(date.into());
        self
    }

    /// Scope the fact to an agent.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Flag the triple as awaiting entity resolution.
    pub fn with_pending_resolution(mut self, pending: bool) -> Self {
        self.pending_resolution = pending;
        self
    }
}

/// An entity mention produced by an extractor: a raw name plus a type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    pub name: String,
    #[serde(default)]
    pub entity_type: String,
}

impl EntityMention {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// A fact mention produced by an extractor, in raw (un-normalized) names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleMention {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TripleMention {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Everything extracted from one exchange, written as a single transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeWrite {
    pub entities: Vec<EntityMention>,
    pub triples: Vec<TripleMention>,
    /// Raw name pairs; the store normalizes and sorts each pair before upsert.
    pub cooccurrences: Vec<(String, String)>,
    pub agent_id: String,
    pub source_exchange_id: String,
    /// Defaults to today's UTC date when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_date: Option<String>,
}

/// A symmetric pairwise count of two entities seen in the same exchange.
///
/// Exactly one row exists per unordered pair, keyed with
/// `entity_a < entity_b` under lexicographic order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cooccurrence {
    pub entity_a: String,
    pub entity_b: String,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

/// A co-occurrence row resolved to the "other side" relative to a queried
/// entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooccurrentEntity {
    pub entity_id: String,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

/// Result of [`GraphStore::resolve_entity`](crate::graph::GraphStore::resolve_entity):
/// the normalized id and whether the entity existed before the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub id: String,
    pub is_new: bool,
}

/// Typed optional-filter for triple queries. All filters are optional and
/// combine conjunctively; subject/object match by normalized id, the
/// predicate matches verbatim.
#[derive(Debug, Clone, Default)]
pub struct TripleFilter {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    pub agent_id: Option<String>,
    pub limit: Option<usize>,
}

impl TripleFilter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by subject (raw name; normalized before matching).
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Filter by predicate (verbatim match).
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Filter by object (raw name; normalized before matching).
    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Scope to an agent.
    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Limit results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Aggregate statistics for one agent's graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: u64,
    pub triple_count: u64,
    /// Ten most recently seen entities for the agent.
    pub recent_entities: Vec<Entity>,
    /// Ten highest-count co-occurrence pairs. Not agent-scoped: the
    /// co-occurrence table carries no agent column.
    pub top_cooccurrences: Vec<Cooccurrence>,
}
