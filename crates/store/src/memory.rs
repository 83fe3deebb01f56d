use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::{Error, Result, ResponseStore, StoredResponse};

/// In-memory [`ResponseStore`]. Content lives only for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryResponseStore {
    entries: DashMap<String, StoredResponse>,
}

#[async_trait]
impl ResponseStore for InMemoryResponseStore {
    async fn put(&self, id: String, response: Value, input_items: Vec<Value>) -> Result<()> {
        let record = StoredResponse { response, input_items };

        match self.entries.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
            }
            dashmap::mapref::entry::Entry::Occupied(slot) => {
                if slot.get() != &record {
                    return Err(Error::Conflict(id));
                }
            }
        }

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<StoredResponse> {
        self.entries.get(id).map(|entry| entry.clone()).ok_or_else(|| Error::NotFound(id.to_owned()))
    }

    async fn get_input_items(&self, id: &str) -> Result<Vec<Value>> {
        self.get(id).await.map(|record| record.input_items)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.entries.remove(id).map(|_| ()).ok_or_else(|| Error::NotFound(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryResponseStore::default();
        store
            .put("resp_1".to_string(), json!({"id": "resp_1"}), vec![json!({"role": "user"})])
            .await
            .unwrap();

        let record = store.get("resp_1").await.unwrap();
        assert_eq!(record.response, json!({"id": "resp_1"}));
        assert_eq!(record.input_items, vec![json!({"role": "user"})]);
    }

    #[tokio::test]
    async fn idempotent_put_with_equal_content() {
        let store = InMemoryResponseStore::default();
        let response = json!({"id": "resp_1"});

        store.put("resp_1".to_string(), response.clone(), vec![]).await.unwrap();
        store.put("resp_1".to_string(), response, vec![]).await.unwrap();
    }

    #[tokio::test]
    async fn put_with_differing_content_conflicts() {
        let store = InMemoryResponseStore::default();
        store.put("resp_1".to_string(), json!({"id": "resp_1"}), vec![]).await.unwrap();

        let err = store
            .put("resp_1".to_string(), json!({"id": "resp_1", "status": "completed"}), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(id) if id == "resp_1"));
    }

    #[tokio::test]
    async fn get_unknown_id_not_found() {
        let store = InMemoryResponseStore::default();
        assert!(matches!(store.get("missing").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_then_get_not_found() {
        let store = InMemoryResponseStore::default();
        store.put("resp_1".to_string(), json!({}), vec![]).await.unwrap();
        store.delete("resp_1").await.unwrap();

        assert!(matches!(store.get("resp_1").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_unknown_id_not_found() {
        let store = InMemoryResponseStore::default();
        assert!(matches!(store.delete("missing").await, Err(Error::NotFound(_))));
    }
}
