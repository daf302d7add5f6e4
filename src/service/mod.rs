//! Host-facing surface: exchange ingestion, retrieval queries, stats.
//!
//! [`MemoryService`] is what a host process wires its lifecycle hooks and
//! RPC gateway to. It owns the per-agent [`StoreRegistry`], the pluggable
//! exchange/query extractors, and the search tunables; every method takes an
//! explicit agent id (defaulting to `"main"` at the request layer) and
//! returns a typed success/failure.

mod types;

pub use types::{IngestReport, MemoryRequest, MemoryResponse, ResponseData};

use crate::error::{Error, Result};
use crate::graph::{
    EntityMention, ExchangeWrite, StoreRegistry, TripleFilter,
};
use crate::search::{
    ExchangeExtractor, ExchangeMessage, GazetteerExtractor, LinkExpansionSearcher, QueryExtractor,
    SearchConfig,
};
use tracing::{debug, info, warn};

/// The application-root service tying the store, searcher and extractors
/// together.
pub struct MemoryService {
    registry: StoreRegistry,
    exchange_extractor: Box<dyn ExchangeExtractor>,
    query_extractor: Box<dyn QueryExtractor>,
    search_config: SearchConfig,
}

impl MemoryService {
    /// Create a service over a registry, with gazetteer-only extraction and
    /// default search tunables.
    pub fn new(registry: StoreRegistry) -> Self {
        Self {
            registry,
            exchange_extractor: Box::new(GazetteerExtractor),
            query_extractor: Box::new(GazetteerExtractor),
            search_config: SearchConfig::default(),
        }
    }

    /// Plug in the host's exchange extractor.
    pub fn with_exchange_extractor(mut self, extractor: Box<dyn ExchangeExtractor>) -> Self {
        self.exchange_extractor = extractor;
        self
    }

    /// Plug in the host's query extractor.
    pub fn with_query_extractor(mut self, extractor: Box<dyn QueryExtractor>) -> Self {
        self.query_extractor = extractor;
        self
    }

    /// Override the search tunables.
    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search_config = config;
        self
    }

    /// The registry backing this service.
    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Ingest one completed exchange: extract, clear any stale triples from
    /// a prior extraction of the same exchange, and commit the batch.
    ///
    /// This is the ingestion boundary of the error contract: failures
    /// (including store contention) are caught here, logged, and reported in
    /// the returned [`IngestReport`]. One failed write never corrupts
    /// already-committed exchanges or blocks subsequent ones.
    pub fn observe_exchange(
        &self,
        agent_id: &str,
        exchange_id: &str,
        date: Option<&str>,
        messages: &[ExchangeMessage],
    ) -> IngestReport {
        match self.ingest(agent_id, exchange_id, date, messages) {
            Ok(triple_ids) => {
                info!(
                    agent = agent_id,
                    exchange = exchange_id,
                    triples = triple_ids.len(),
                    "exchange ingested"
                );
                IngestReport {
                    exchange_id: exchange_id.to_string(),
                    triple_ids,
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    agent = agent_id,
                    exchange = exchange_id,
                    busy = e.is_busy(),
                    error = %e,
                    "exchange ingestion failed"
                );
                IngestReport {
                    exchange_id: exchange_id.to_string(),
                    triple_ids: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn ingest(
        &self,
        agent_id: &str,
        exchange_id: &str,
        date: Option<&str>,
        messages: &[ExchangeMessage],
    ) -> Result<Vec<String>> {
        if exchange_id.trim().is_empty() {
            return Err(Error::missing_param("exchange_id"));
        }
        let store = self.registry.get_or_create(agent_id)?;

        // Recent entities double as the extractor's gazetteer sample
        let known: Vec<EntityMention> = store
            .get_stats(agent_id)?
            .recent_entities
            .into_iter()
            .map(|e| EntityMention::new(e.canonical_name, e.entity_type))
            .collect();

        let extraction = self.exchange_extractor.extract(messages, &known)?;
        if extraction.entities.is_empty() && extraction.triples.is_empty() {
            debug!(
                agent = agent_id,
                exchange = exchange_id,
                "nothing extracted; skipping write"
            );
            return Ok(Vec::new());
        }

        // Re-extraction: drop the exchange's previous facts first
        let removed = store.delete_triples_by_exchange(exchange_id)?;
        if removed > 0 {
            debug!(
                exchange = exchange_id,
                removed, "cleared stale triples before re-extraction"
            );
        }

        store.write_exchange(&ExchangeWrite {
            entities: extraction.entities,
            triples: extraction.triples,
            cooccurrences: extraction.cooccurrences,
            agent_id: agent_id.to_string(),
            source_exchange_id: exchange_id.to_string(),
            source_date: date.map(|d| d.to_string()),
        })
    }

    /// Answer one service request with a typed success/failure envelope.
    pub fn handle(&self, request: &MemoryRequest) -> MemoryResponse {
        match self.dispatch(request) {
            Ok(data) => MemoryResponse::ok(data),
            Err(e) => MemoryResponse::fail(e.to_string()),
        }
    }

    fn dispatch(&self, request: &MemoryRequest) -> Result<ResponseData> {
        match request {
            MemoryRequest::Stats { agent_id } => {
                let store = self.registry.get_or_create(agent_id)?;
                Ok(ResponseData::Stats(store.get_stats(agent_id)?))
            }
            MemoryRequest::Search {
                query,
                agent_id,
                limit,
                known_entities,
            } => {
                let store = self.registry.get_or_create(agent_id)?;
                let extracted = self.query_extractor.extract_query(query, known_entities);
                let searcher = LinkExpansionSearcher::new(store, self.search_config.clone());
                let response =
                    searcher.search(query, agent_id, &extracted, known_entities, *limit)?;
                Ok(ResponseData::Search(response))
            }
            MemoryRequest::EntityContext { entity, agent_id } => {
                if entity.trim().is_empty() {
                    return Err(Error::missing_param("entity"));
                }
                let store = self.registry.get_or_create(agent_id)?;
                let searcher = LinkExpansionSearcher::new(store, self.search_config.clone());
                searcher
                    .get_entity_context(entity, agent_id)?
                    .map(ResponseData::EntityContext)
                    .ok_or_else(|| Error::not_found(format!("entity '{}'", entity)))
            }
            MemoryRequest::Triples {
                agent_id,
                subject,
                predicate,
                object,
                limit,
            } => {
                let store = self.registry.get_or_create(agent_id)?;
                let mut filter = TripleFilter::new().agent(agent_id.clone());
                if let Some(subject) = subject {
                    filter = filter.subject(subject.clone());
                }
                if let Some(predicate) = predicate {
                    filter = filter.predicate(predicate.clone());
                }
                if let Some(object) = object {
                    filter = filter.object(object.clone());
                }
                if let Some(limit) = limit {
                    filter = filter.limit(*limit);
                }
                Ok(ResponseData::Triples(store.query_triples(&filter)?))
            }
            MemoryRequest::ListAgents => Ok(ResponseData::Agents(self.registry.list_agents())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TripleMention;
    use crate::search::Extraction;

    /// Stands in for the host's NL extractor: returns a fixed payload.
    struct FixedExtractor(Extraction);

    impl ExchangeExtractor for FixedExtractor {
        fn extract(
            &self,
            _messages: &[ExchangeMessage],
            _known: &[EntityMention],
        ) -> crate::error::Result<Extraction> {
            Ok(self.0.clone())
        }
    }

    fn alice_in_paris() -> Extraction {
        Extraction {
            entities: vec![
                EntityMention::new("Alice", "PERSON"),
                EntityMention::new("Paris", "PLACE"),
            ],
            triples: vec![TripleMention::new("Alice", "visited", "Paris").with_confidence(0.8)],
            cooccurrences: Vec::new(),
        }
    }

    fn service(dir: &std::path::Path, extraction: Extraction) -> MemoryService {
        MemoryService::new(StoreRegistry::new(dir))
            .with_exchange_extractor(Box::new(FixedExtractor(extraction)))
    }

    fn messages() -> Vec<ExchangeMessage> {
        vec![
            ExchangeMessage::new("user", "Where did Alice go?"),
            ExchangeMessage::new("assistant", "Alice visited Paris."),
        ]
    }

    #[test]
    fn test_ingest_then_search_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), alice_in_paris());

        let report = service.observe_exchange("main", "e1", Some("2026-08-01"), &messages());
        assert!(report.stored());
        assert_eq!(report.triple_ids.len(), 1);

        let response = service.handle(&MemoryRequest::Search {
            query: "Tell me about Alice".to_string(),
            agent_id: "main".to_string(),
            limit: None,
            known_entities: vec![EntityMention::new("Alice", "PERSON")],
        });

        assert!(response.success);
        let Some(ResponseData::Search(search)) = response.data else {
            panic!("expected search data");
        };
        assert_eq!(search.exchanges.len(), 1);
        let hit = &search.exchanges[0];
        assert_eq!(hit.exchange_id, "e1");
        assert_eq!(hit.shared_entity_count, 1);
        assert!((hit.score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_reingestion_replaces_stale_triples() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), alice_in_paris());

        service.observe_exchange("main", "e1", None, &messages());
        service.observe_exchange("main", "e1", None, &messages());

        let response = service.handle(&MemoryRequest::Triples {
            agent_id: "main".to_string(),
            subject: None,
            predicate: None,
            object: None,
            limit: None,
        });
        let Some(ResponseData::Triples(triples)) = response.data else {
            panic!("expected triples data");
        };
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn test_failed_ingest_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = alice_in_paris();
        bad.triples.push(TripleMention::new("", "broken", "x"));
        let service = service(dir.path(), bad);

        let report = service.observe_exchange("main", "e1", None, &messages());
        assert!(!report.stored());
        assert!(report.error.is_some());

        // The failed batch left nothing behind and the service still answers
        let response = service.handle(&MemoryRequest::Stats {
            agent_id: "main".to_string(),
        });
        assert!(response.success);
        let Some(ResponseData::Stats(stats)) = response.data else {
            panic!("expected stats data");
        };
        assert_eq!(stats.entity_count, 0);
        assert_eq!(stats.triple_count, 0);
    }

    #[test]
    fn test_entity_context_not_found_is_typed_failure() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), alice_in_paris());

        let response = service.handle(&MemoryRequest::EntityContext {
            entity: "Zelda".to_string(),
            agent_id: "main".to_string(),
        });
        assert!(!response.success);
        assert!(response.error.unwrap().contains("Zelda"));
    }

    #[test]
    fn test_missing_entity_param_is_typed_failure() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), alice_in_paris());

        let response = service.handle(&MemoryRequest::EntityContext {
            entity: "   ".to_string(),
            agent_id: "main".to_string(),
        });
        assert!(!response.success);
        assert!(response.error.unwrap().contains("entity"));
    }

    #[test]
    fn test_empty_query_is_successful_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), alice_in_paris());
        service.observe_exchange("main", "e1", None, &messages());

        let response = service.handle(&MemoryRequest::Search {
            query: String::new(),
            agent_id: "main".to_string(),
            limit: None,
            known_entities: Vec::new(),
        });
        assert!(response.success);
        let Some(ResponseData::Search(search)) = response.data else {
            panic!("expected search data");
        };
        assert!(search.exchanges.is_empty());
    }

    #[test]
    fn test_agents_are_isolated_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), alice_in_paris());

        service.observe_exchange("main", "e1", None, &messages());
        service.observe_exchange("research", "e2", None, &messages());

        let response = service.handle(&MemoryRequest::ListAgents);
        let Some(ResponseData::Agents(agents)) = response.data else {
            panic!("expected agents data");
        };
        assert_eq!(agents, vec!["main", "research"]);

        // Each agent's stats see only its own rows
        let response = service.handle(&MemoryRequest::Stats {
            agent_id: "research".to_string(),
        });
        let Some(ResponseData::Stats(stats)) = response.data else {
            panic!("expected stats data");
        };
        assert_eq!(stats.triple_count, 1);
    }
}
