//! Response Store configuration.

use serde::Deserialize;
use url::Url;

/// Configuration for the Response Store backing `previous_response_id` chaining.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Which store backend to use.
    pub backend: StoreBackend,
    /// Maximum number of hops `previous_response_id` is allowed to walk back
    /// before the chain is considered cyclic and rejected.
    pub max_chain_depth: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            max_chain_depth: 128,
        }
    }
}

/// Backend selector for the Response Store.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Keep responses in an in-process map. Lost on restart.
    Memory,
    /// Delegate persistence to an external document store reachable over HTTP.
    Document {
        /// Base URL of the document store.
        url: Url,
    },
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::Memory
    }
}
