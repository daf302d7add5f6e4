//! Link-expansion search over the knowledge graph.
//!
//! Given a query's entity mentions, scores prior exchanges by one-hop graph
//! structure: triples touching a query entity contribute their confidence
//! directly, and triples of frequently co-occurring entities contribute a
//! count-weighted boost. Exchanges reached only through co-occurrence carry
//! no shared entities and are gated out by default.

use crate::error::Result;
use crate::graph::{
    CooccurrentEntity, Entity, EntityMention, GraphStore, DEFAULT_COOCCURRENCE_LIMIT,
};
use crate::search::extract::{merge_mentions, GazetteerExtractor, QueryExtractor};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Tunables for the two-stage scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result cap when the caller does not pass a limit.
    pub max_results: usize,
    /// Score added per co-occurrence count unit in the expansion pass.
    pub cooccurrence_boost: f64,
    /// Minimum distinct directly-shared query entities an exchange needs
    /// to survive the gate.
    pub min_shared_entities: usize,
    /// Per-entity triple cap in the direct pass.
    pub triple_fetch_limit: usize,
    /// Top co-occurring neighbours expanded per query entity.
    pub cooccurrence_expansion: usize,
    /// Per-neighbour triple cap in the expansion pass.
    pub expansion_triple_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            cooccurrence_boost: 0.1,
            min_shared_entities: 1,
            triple_fetch_limit: 100,
            cooccurrence_expansion: 5,
            expansion_triple_limit: 20,
        }
    }
}

/// One exchange surfaced by a search, with its accumulated evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeHit {
    pub exchange_id: String,
    pub score: f64,
    /// Query entities that hit this exchange directly (co-occurrence
    /// contributions do not count as shared).
    pub shared_entities: Vec<String>,
    pub shared_entity_count: usize,
    pub max_confidence: f64,
    /// Most recent source date among the direct hits, `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_date: Option<String>,
}

/// Ranked exchanges plus the full merged query-entity list (untruncated).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub exchanges: Vec<ExchangeHit>,
    pub entities: Vec<EntityMention>,
}

/// An entity's one-hop neighbourhood, grouped for presentation to a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityContext {
    pub entity: Entity,
    /// Predicate -> edges carrying it, insertion grouped.
    pub relationships: BTreeMap<String, Vec<RelationEdge>>,
    pub cooccurrences: Vec<CooccurrentEntity>,
    pub triple_count: usize,
}

/// One edge in an entity context, in normalized ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationEdge {
    pub subject: String,
    pub object: String,
    pub confidence: f64,
    pub date: String,
}

#[derive(Default)]
struct ExchangeAccumulator {
    score: f64,
    shared: BTreeSet<String>,
    max_confidence: f64,
    latest_date: Option<String>,
}

/// Scores and ranks exchanges from graph structure for one agent's store.
pub struct LinkExpansionSearcher {
    store: Arc<GraphStore>,
    config: SearchConfig,
}

impl LinkExpansionSearcher {
    pub fn new(store: Arc<GraphStore>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    /// Expand a query into ranked related exchanges.
    ///
    /// `extracted` are the mentions an external extractor produced for the
    /// query text; the searcher adds its own gazetteer pass over
    /// `known_entities` and merges the two lists case-insensitively, first
    /// occurrence winning. Finding no entities is a normal empty-result
    /// outcome, not an error.
    pub fn search(
        &self,
        query_text: &str,
        agent_id: &str,
        extracted: &[EntityMention],
        known_entities: &[EntityMention],
        limit: Option<usize>,
    ) -> Result<SearchResponse> {
        let gazetteer = GazetteerExtractor.extract_query(query_text, known_entities);
        let mentions = merge_mentions(extracted.to_vec(), gazetteer);

        if mentions.is_empty() {
            debug!(agent = agent_id, "no query entities; returning empty result");
            return Ok(SearchResponse::default());
        }

        let mut per_exchange: HashMap<String, ExchangeAccumulator> = HashMap::new();

        // Direct pass: triples touching a query entity contribute confidence
        for mention in &mentions {
            let triples = self.store.get_triples_for(
                &mention.name,
                agent_id,
                self.config.triple_fetch_limit,
            )?;
            for triple in triples {
                let Some(exchange_id) = triple.source_exchange_id else {
                    continue;
                };
                let acc = per_exchange.entry(exchange_id).or_default();
                acc.score += triple.confidence;
                acc.shared.insert(mention.name.clone());
                if triple.confidence > acc.max_confidence {
                    acc.max_confidence = triple.confidence;
                }
                if acc
                    .latest_date
                    .as_deref()
                    .map(|d| triple.source_date.as_str() > d)
                    .unwrap_or(true)
                {
                    acc.latest_date = Some(triple.source_date);
                }
            }
        }

        // Expansion pass: neighbours reached through the co-occurrence cache
        // contribute a count-weighted boost, but no shared entities and no
        // confidence tracking
        for mention in &mentions {
            let neighbours = self
                .store
                .get_cooccurrences(&mention.name, self.config.cooccurrence_expansion)?;
            for neighbour in neighbours {
                let triples = self.store.get_triples_for_id(
                    &neighbour.entity_id,
                    agent_id,
                    self.config.expansion_triple_limit,
                )?;
                for triple in triples {
                    let Some(exchange_id) = triple.source_exchange_id else {
                        continue;
                    };
                    per_exchange.entry(exchange_id).or_default().score +=
                        self.config.cooccurrence_boost * neighbour.count as f64;
                }
            }
        }

        let mut hits: Vec<ExchangeHit> = per_exchange
            .into_iter()
            .filter(|(_, acc)| acc.shared.len() >= self.config.min_shared_entities)
            .map(|(exchange_id, acc)| ExchangeHit {
                exchange_id,
                score: acc.score,
                shared_entity_count: acc.shared.len(),
                shared_entities: acc.shared.into_iter().collect(),
                max_confidence: acc.max_confidence,
                latest_date: acc.latest_date,
            })
            .collect();

        // Score descending; exchange id as the deterministic tie-break
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.exchange_id.cmp(&b.exchange_id))
        });
        hits.truncate(limit.unwrap_or(self.config.max_results));

        debug!(
            agent = agent_id,
            entities = mentions.len(),
            exchanges = hits.len(),
            "link-expansion search complete"
        );

        Ok(SearchResponse {
            exchanges: hits,
            entities: mentions,
        })
    }

    /// The one-hop neighbourhood of a registered entity, or `None` if the
    /// name is unknown to this agent's graph.
    pub fn get_entity_context(
        &self,
        entity_name: &str,
        agent_id: &str,
    ) -> Result<Option<EntityContext>> {
        let Some(entity) = self.store.get_entity_by_name(entity_name, agent_id)? else {
            return Ok(None);
        };

        let triples = self.store.get_triples_for_id(
            &entity.id,
            agent_id,
            self.config.triple_fetch_limit,
        )?;

        let mut relationships: BTreeMap<String, Vec<RelationEdge>> = BTreeMap::new();
        for triple in &triples {
            relationships
                .entry(triple.predicate.clone())
                .or_default()
                .push(RelationEdge {
                    subject: triple.subject.clone(),
                    object: triple.object.clone(),
                    confidence: triple.confidence,
                    date: triple.source_date.clone(),
                });
        }

        let cooccurrences = self
            .store
            .get_cooccurrences(entity_name, DEFAULT_COOCCURRENCE_LIMIT)?;

        Ok(Some(EntityContext {
            entity,
            relationships,
            cooccurrences,
            triple_count: triples.len(),
        }))
    }
}
