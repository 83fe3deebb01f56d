use async_trait::async_trait;
use dashmap::DashMap;

use crate::{Error, Result};

/// An uploaded file as tracked by the `/v1/files` surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Server-assigned id, e.g. `file-<uuid>`.
    pub id: String,
    pub filename: String,
    /// One of `assistants | batch | fine_tune | vision | user_data | evals`.
    pub purpose: String,
    pub bytes: Vec<u8>,
    /// Unix epoch seconds.
    pub created_at: i64,
}

/// Storage for raw uploaded files, independent of the Response Store and Vector Index.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, file: StoredFile) -> Result<StoredFile>;
    async fn get(&self, id: &str) -> Result<StoredFile>;
    async fn list(&self) -> Result<Vec<StoredFile>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory [`FileStore`]. Uploaded bytes do not survive a process restart.
#[derive(Default)]
pub struct InMemoryFileStore {
    files: DashMap<String, StoredFile>,
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn put(&self, file: StoredFile) -> Result<StoredFile> {
        self.files.insert(file.id.clone(), file.clone());
        Ok(file)
    }

    async fn get(&self, id: &str) -> Result<StoredFile> {
        self.files.get(id).map(|entry| entry.clone()).ok_or_else(|| Error::NotFound(id.to_owned()))
    }

    async fn list(&self) -> Result<Vec<StoredFile>> {
        Ok(self.files.iter().map(|entry| entry.clone()).collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.files.remove(id).map(|_| ()).ok_or_else(|| Error::NotFound(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryFileStore::default();
        let file = StoredFile {
            id: "file-1".to_string(),
            filename: "notes.txt".to_string(),
            purpose: "assistants".to_string(),
            bytes: b"hello".to_vec(),
            created_at: 0,
        };

        store.put(file.clone()).await.unwrap();
        assert_eq!(store.get("file-1").await.unwrap(), file);
    }

    #[tokio::test]
    async fn delete_then_get_not_found() {
        let store = InMemoryFileStore::default();
        store
            .put(StoredFile {
                id: "file-1".to_string(),
                filename: "notes.txt".to_string(),
                purpose: "assistants".to_string(),
                bytes: vec![],
                created_at: 0,
            })
            .await
            .unwrap();

        store.delete("file-1").await.unwrap();
        assert!(matches!(store.get("file-1").await, Err(Error::NotFound(_))));
    }
}
