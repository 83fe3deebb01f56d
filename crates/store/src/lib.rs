//! Response Store: persists completed Responses and their input-item history,
//! and raw uploaded files.
//!
//! The store crate deliberately knows nothing about the Responses API's typed
//! data model — it is a leaf dependency of the `responses` crate, so records
//! are passed through as `serde_json::Value`. The orchestrator is responsible
//! for interpreting (and chaining via `previous_response_id`) the JSON it gets
//! back.

mod error;
mod files;
mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use error::{Error, Result};
pub use files::{FileStore, InMemoryFileStore, StoredFile};
pub use memory::InMemoryResponseStore;

/// A persisted response together with the input-item history that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub response: Value,
    pub input_items: Vec<Value>,
}

/// Capability set required of any Response Store backend.
///
/// `put` is idempotent for identical content and conflicts otherwise, per the
/// round-trip property: two `put` calls with the same id are idempotent if
/// the content is equal, else an error.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn put(&self, id: String, response: Value, input_items: Vec<Value>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<StoredResponse>;
    async fn get_input_items(&self, id: &str) -> Result<Vec<Value>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Builds the configured [`ResponseStore`] backend.
pub fn build_response_store(config: &config::StoreConfig) -> anyhow::Result<Arc<dyn ResponseStore>> {
    match &config.backend {
        config::StoreBackend::Memory => Ok(Arc::new(InMemoryResponseStore::default())),
        config::StoreBackend::Document { url } => {
            anyhow::bail!("store.backend = \"document\" ({url}) is not implemented yet; use \"memory\"")
        }
    }
}

/// Builds the configured [`FileStore`] backend. Files currently always use the
/// in-memory backend; a durable backend would be selected the same way as
/// [`build_response_store`] once `store.backend = "document"` lands.
pub fn build_file_store(_config: &config::StoreConfig) -> Arc<dyn FileStore> {
    Arc::new(InMemoryFileStore::default())
}
