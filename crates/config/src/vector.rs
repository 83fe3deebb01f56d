//! Vector Search Tool configuration.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use url::Url;

/// Configuration for the built-in `file_search` vector index tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VectorConfig {
    /// Base URL of the embeddings endpoint (OpenAI-compatible `/embeddings`).
    pub embedding_url: Url,
    /// API key sent as a bearer token to the embedding endpoint.
    pub embedding_api_key: Option<DynamicString<String>>,
    /// Embedding model name passed to the embeddings endpoint.
    pub embedding_model: String,
    /// Directory the index snapshot is persisted under.
    pub index_path: PathBuf,
    /// Default chunking policy applied when a vector store doesn't override it.
    pub chunking: ChunkingConfig,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            embedding_url: Url::parse("https://api.openai.com/v1/embeddings").expect("default URL should be valid"),
            embedding_api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            index_path: PathBuf::from("./meridian-data/vector-index"),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl VectorConfig {
    /// The embedding API key as a secret, ready to use as a bearer token.
    pub fn embedding_api_key(&self) -> Option<SecretString> {
        self.embedding_api_key
            .clone()
            .map(|key| SecretString::from(key.into_inner()))
    }
}

/// Default chunking policy for documents added to a vector store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk.
    pub max_chunk_size_tokens: u32,
    /// Tokens of overlap between adjacent chunks.
    pub chunk_overlap_tokens: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size_tokens: 1000,
            chunk_overlap_tokens: 200,
        }
    }
}
