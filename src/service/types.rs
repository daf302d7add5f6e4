//! Request/response types for the host-facing surface.

use crate::graph::{EntityMention, GraphStats, Triple, DEFAULT_AGENT_ID};
use crate::search::{EntityContext, SearchResponse};
use serde::{Deserialize, Serialize};

fn default_agent() -> String {
    DEFAULT_AGENT_ID.to_string()
}

/// A query against the memory service. Every variant carries an agent id
/// defaulting to `"main"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MemoryRequest {
    /// Aggregate counts for one agent's graph.
    Stats {
        #[serde(default = "default_agent")]
        agent_id: String,
    },
    /// Link-expansion search over prior exchanges.
    Search {
        query: String,
        #[serde(default = "default_agent")]
        agent_id: String,
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        known_entities: Vec<EntityMention>,
    },
    /// One-hop neighbourhood of a registered entity.
    EntityContext {
        entity: String,
        #[serde(default = "default_agent")]
        agent_id: String,
    },
    /// Filtered triple listing.
    Triples {
        #[serde(default = "default_agent")]
        agent_id: String,
        #[serde(default)]
        subject: Option<String>,
        #[serde(default)]
        predicate: Option<String>,
        #[serde(default)]
        object: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Agent ids with a store.
    ListAgents,
}

/// Payload of a successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Stats(GraphStats),
    Search(SearchResponse),
    EntityContext(EntityContext),
    Triples(Vec<Triple>),
    Agents(Vec<String>),
}

/// Typed success/failure envelope for every service method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MemoryResponse {
    pub fn ok(data: ResponseData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of one exchange ingestion. A failed write is isolated and
/// reported here; it never propagates out of the ingestion boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub exchange_id: String,
    /// Ids of the triples written (or re-confirmed) for this exchange.
    pub triple_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestReport {
    /// Whether the exchange write committed.
    pub fn stored(&self) -> bool {
        self.error.is_none()
    }
}
