//! Persistent knowledge graph of entities and subject-predicate-object facts.
//!
//! The graph module provides the three tables behind conversational memory
//! and the invariants that keep them deduplicated:
//!
//! - **Entity registry**: canonical names mapped to stable, normalization-
//!   derived ids, with mention counts and first/last-seen bookkeeping
//! - **Triple store**: directed labeled facts, unique per
//!   (subject, predicate, object, agent), accumulating confidence on conflict
//! - **Co-occurrence cache**: symmetric pair counts keyed in sorted order
//!
//! State is partitioned per agent id; [`StoreRegistry`] hands out one
//! [`GraphStore`] per agent, each with its own backing file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kgm_core::graph::{GraphStore, TripleInput, TripleFilter};
//!
//! let store = GraphStore::in_memory()?;
//!
//! store.upsert_entity("Alice", "PERSON", "main")?;
//! store.add_triple(
//!     &TripleInput::new("Alice", "visited", "Paris").with_confidence(0.8),
//! )?;
//!
//! let facts = store.query_triples(&TripleFilter::new().subject("Alice"))?;
//! ```

mod registry;
mod schema;
mod store;
mod types;

pub use registry::StoreRegistry;
pub use schema::{get_schema_version, initialize_schema, is_initialized, BUSY_TIMEOUT_MS, SCHEMA_VERSION};
pub use store::GraphStore;
pub use types::{
    normalize_entity_id, Cooccurrence, CooccurrentEntity, Entity, EntityMention, ExchangeWrite,
    GraphStats, ResolvedEntity, Triple, TripleFilter, TripleInput, TripleMention,
    DEFAULT_AGENT_ID, DEFAULT_COOCCURRENCE_LIMIT, DEFAULT_PREFIX_LIMIT, DEFAULT_TRIPLE_LIMIT,
};
