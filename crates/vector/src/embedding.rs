use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Client for an external, OpenAI-compatible `/embeddings` endpoint.
pub(crate) struct EmbeddingClient {
    client: Client,
    url: Url,
    api_key: Option<SecretString>,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub(crate) fn new(config: &config::VectorConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.embedding_url.clone(),
            api_key: config.embedding_api_key(),
            model: config.embedding_model.clone(),
        }
    }

    pub(crate) async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self.client.post(self.url.clone()).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("request to embedding service failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("embedding service returned {status}: {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("failed to parse embedding response: {e}")))?;

        parsed
            .data
            .pop()
            .map(|datum| datum.embedding)
            .ok_or_else(|| Error::Embedding("embedding response contained no data".to_string()))
    }
}
