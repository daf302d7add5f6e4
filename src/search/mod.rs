//! Link-expansion retrieval: query entities expanded one hop through the
//! triple store (direct evidence) and the co-occurrence cache (indirect
//! evidence) into a ranked list of prior exchanges.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kgm_core::graph::{EntityMention, GraphStore};
//! use kgm_core::search::{LinkExpansionSearcher, SearchConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(GraphStore::in_memory()?);
//! let searcher = LinkExpansionSearcher::new(store, SearchConfig::default());
//!
//! let known = vec![EntityMention::new("Alice", "PERSON")];
//! let result = searcher.search("Tell me about Alice", "main", &[], &known, None)?;
//! for hit in result.exchanges {
//!     println!("{} scored {:.2}", hit.exchange_id, hit.score);
//! }
//! ```

mod extract;
mod searcher;

pub use extract::{
    merge_mentions, ExchangeExtractor, ExchangeMessage, Extraction, GazetteerExtractor,
    QueryExtractor,
};
pub use searcher::{
    EntityContext, ExchangeHit, LinkExpansionSearcher, RelationEdge, SearchConfig, SearchResponse,
};
