//! Configuration for the memory service.

use crate::error::{Error, Result};
use crate::graph::{StoreRegistry, DEFAULT_AGENT_ID};
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration. Every field has a default, so an empty or
/// missing config file yields a working setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding the per-agent store files. `~` is expanded.
    pub data_dir: String,
    /// Agent id used when callers do not specify one.
    pub agent_id: String,
    /// Search tunables.
    pub search: SearchConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.kgm/memory".to_string(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
            search: SearchConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Load configuration from a JSON file; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("parse {}: {}", path.display(), e)))
    }

    /// The data directory with `~` expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }

    /// Build a store registry rooted at the resolved data directory.
    pub fn registry(&self) -> StoreRegistry {
        StoreRegistry::new(self.resolved_data_dir())
    }
}
