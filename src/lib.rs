//! # kgm-core
//!
//! A knowledge-graph memory library for conversational agents: entities and
//! subject-predicate-object facts extracted from exchanges are persisted per
//! agent, and retrieval queries are answered by one-hop link expansion with
//! co-occurrence boosting.
//!
//! ## Core Components
//!
//! - **Graph**: entity registry, triple store and co-occurrence cache over
//!   SQLite, with a per-agent store registry
//! - **Search**: the link-expansion searcher and the extractor seam
//! - **Service**: the host-facing ingest/query surface
//! - **Config**: data directory and search tunables
//!
//! ## Example
//!
//! ```rust,ignore
//! use kgm_core::{MemoryConfig, MemoryRequest, MemoryService};
//! use kgm_core::search::ExchangeMessage;
//!
//! let config = MemoryConfig::load("kgm.json")?;
//! let service = MemoryService::new(config.registry());
//!
//! // Lifecycle hook: one completed exchange
//! let report = service.observe_exchange(
//!     "main",
//!     "exchange-42",
//!     None,
//!     &[ExchangeMessage::new("user", "Alice visited Paris last spring")],
//! );
//!
//! // Gateway: a retrieval query
//! let response = service.handle(&MemoryRequest::Search {
//!     query: "Tell me about Alice".into(),
//!     agent_id: "main".into(),
//!     limit: None,
//!     known_entities: vec![],
//! });
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod search;
pub mod service;

// Re-exports for convenience
pub use config::MemoryConfig;
pub use error::{Error, Result};
pub use graph::{
    normalize_entity_id, Cooccurrence, CooccurrentEntity, Entity, EntityMention, ExchangeWrite,
    GraphStats, GraphStore, ResolvedEntity, StoreRegistry, Triple, TripleFilter, TripleInput,
    TripleMention,
};
pub use search::{
    EntityContext, ExchangeExtractor, ExchangeHit, ExchangeMessage, Extraction,
    GazetteerExtractor, LinkExpansionSearcher, QueryExtractor, SearchConfig, SearchResponse,
};
pub use service::{IngestReport, MemoryRequest, MemoryResponse, MemoryService, ResponseData};
