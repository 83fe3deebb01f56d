use std::{collections::HashMap, path::PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Error, Result,
    chunking::{self, ChunkingPolicy},
    embedding::EmbeddingClient,
    similarity::cosine_similarity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Chunk {
    chunk_id: String,
    content: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    filename: String,
    metadata: Value,
    chunks: Vec<Chunk>,
}

/// One similarity-search hit, matching `VectorIndexEntry`'s externally visible shape.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file_id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Value,
}

/// Equality filter applied over file/chunk metadata: `{key, op: eq, value}`.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub key: String,
    pub value: Value,
}

impl SearchFilter {
    fn matches(&self, metadata: &Value) -> bool {
        metadata.get(&self.key).is_some_and(|found| found == &self.value)
    }
}

/// Persistence-backed index for the `file_search` tool.
///
/// Concurrent `search` is safe (the underlying map is read without taking a
/// global lock); `index`/`delete` serialise through the map's per-shard locks
/// and then rewrite the on-disk snapshot so the index survives a restart.
pub struct VectorIndex {
    files: DashMap<String, FileEntry>,
    embedding_client: EmbeddingClient,
    default_policy: ChunkingPolicy,
    snapshot_path: PathBuf,
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    files: HashMap<String, FileEntry>,
}

impl VectorIndex {
    /// Loads any existing on-disk snapshot, or starts empty if none exists.
    pub async fn new(config: &config::VectorConfig) -> anyhow::Result<Self> {
        let snapshot_path = config.index_path.clone();

        let files = match tokio::fs::read(&snapshot_path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| anyhow::anyhow!("corrupt vector index snapshot at {}: {e}", snapshot_path.display()))?;
                snapshot.files.into_iter().collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DashMap::new(),
            Err(e) => return Err(anyhow::anyhow!("failed to read vector index snapshot: {e}")),
        };

        Ok(Self {
            files,
            embedding_client: EmbeddingClient::new(config),
            default_policy: ChunkingPolicy::from(&config.chunking),
            snapshot_path,
        })
    }

    /// Chunks `content`, embeds each chunk, and stores it under `file_id`, replacing
    /// any prior entry for the same id.
    pub async fn index(
        &self,
        file_id: &str,
        content: &str,
        filename: &str,
        metadata: Value,
        chunking: Option<ChunkingPolicy>,
    ) -> Result<()> {
        let policy = chunking.unwrap_or(self.default_policy);
        let mut chunks = Vec::new();

        for (i, text) in chunking::chunk(content, policy).into_iter().enumerate() {
            let embedding = self.embedding_client.embed(&text).await?;
            chunks.push(Chunk {
                chunk_id: format!("{file_id}-{i}"),
                content: text,
                embedding,
            });
        }

        self.files.insert(
            file_id.to_string(),
            FileEntry {
                filename: filename.to_string(),
                metadata,
                chunks,
            },
        );

        self.persist().await
    }

    /// Returns the top `max_results` chunks across all indexed files matching
    /// `query`, scored by cosine similarity and filtered by conjunction.
    pub async fn search(&self, query: &str, max_results: usize, filters: &[SearchFilter]) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embedding_client.embed(query).await?;

        let mut hits: Vec<SearchHit> = self
            .files
            .iter()
            .filter(|entry| filters.iter().all(|filter| filter.matches(&entry.metadata)))
            .flat_map(|entry| {
                let file_id = entry.key().clone();
                let metadata = entry.metadata.clone();
                entry
                    .chunks
                    .iter()
                    .map(|chunk| SearchHit {
                        file_id: file_id.clone(),
                        score: cosine_similarity(&query_embedding, &chunk.embedding),
                        content: chunk.content.clone(),
                        metadata: metadata.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(max_results);

        Ok(hits)
    }

    /// Removes a file and all its chunks from the index.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        self.files.remove(file_id).ok_or_else(|| Error::NotFound(file_id.to_owned()))?;
        self.persist().await
    }

    /// Returns the file-level metadata recorded at index time.
    pub fn get_metadata(&self, file_id: &str) -> Result<Value> {
        self.files
            .get(file_id)
            .map(|entry| entry.metadata.clone())
            .ok_or_else(|| Error::NotFound(file_id.to_owned()))
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = Snapshot {
            files: self.files.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect(),
        };

        let bytes = serde_json::to_vec(&snapshot).map_err(|e| Error::Persistence(e.to_string()))?;

        if let Some(parent) = self.snapshot_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Persistence(e.to_string()))?;
        }

        tokio::fs::write(&self.snapshot_path, bytes)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))
    }
}
