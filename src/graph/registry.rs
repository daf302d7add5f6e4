//! Per-agent registry of live store handles.
//!
//! Each agent id owns an independent backing file under the registry's data
//! directory; physical isolation is the contention-reduction mechanism, not
//! in-process locking.

use crate::error::{Error, Result};
use crate::graph::store::GraphStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Registry of per-agent store handles, owned by the application root.
///
/// Handles are opened lazily and cached for the life of the registry.
pub struct StoreRegistry {
    data_dir: PathBuf,
    stores: Mutex<HashMap<String, Arc<GraphStore>>>,
}

impl StoreRegistry {
    /// Create a registry rooted at the given data directory. The directory
    /// is created on first store open, not here.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// The directory holding the per-agent `.db` files.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Get the agent's store handle, opening `<data_dir>/<agent>.db` on
    /// first use.
    pub fn get_or_create(&self, agent_id: &str) -> Result<Arc<GraphStore>> {
        if agent_id.trim().is_empty() {
            return Err(Error::missing_param("agent_id"));
        }

        let mut stores = self
            .stores
            .lock()
            .map_err(|e| Error::Internal(format!("registry lock poisoned: {}", e)))?;

        if let Some(store) = stores.get(agent_id) {
            return Ok(store.clone());
        }

        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| Error::Storage(format!("create {}: {}", self.data_dir.display(), e)))?;

        let path = self.data_dir.join(format!("{}.db", sanitize_agent_id(agent_id)));
        let store = Arc::new(GraphStore::open(&path)?);
        info!(agent = agent_id, path = %path.display(), "opened knowledge graph store");

        stores.insert(agent_id.to_string(), store.clone());
        Ok(store)
    }

    /// Agent ids with a live handle or a `.db` file on disk, sorted.
    pub fn list_agents(&self) -> Vec<String> {
        let mut agents: Vec<String> = self
            .stores
            .lock()
            .map(|stores| stores.keys().cloned().collect())
            .unwrap_or_default();

        if let Ok(entries) = std::fs::read_dir(&self.data_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("db") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        agents.push(stem.to_string());
                    }
                }
            }
        }

        agents.sort();
        agents.dedup();
        agents
    }
}

/// Restrict agent ids to filename-safe characters.
fn sanitize_agent_id(agent_id: &str) -> String {
    agent_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
