//! OpenAI-compatible embedding client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use tandem_kernel::config::SemanticCacheConfig;
use tandem_kernel::{EmbeddingProvider, Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP adapter for a fixed-dimension embedding service.
pub struct EmbeddingClient {
    endpoint: String,
    credential: String,
    model: String,
    client: Client,
}

impl EmbeddingClient {
    pub fn new(config: &SemanticCacheConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(Error::Config("embedding endpoint is empty".to_string()));
        }
        if config.credential.is_empty() {
            return Err(Error::Config("embedding credential is empty".to_string()));
        }
        if config.model.is_empty() {
            return Err(Error::Config("embedding model is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            credential: config.credential.clone(),
            model: config.model.clone(),
            client,
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.endpoint)
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRecord>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRecord {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::BadRequest(
                "embedding text must not be empty".to_string(),
            ));
        }

        let body = json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream(&self.model, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                &self.model,
                format!("HTTP {status}: {detail}"),
            ));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(&self.model, e))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|record| record.embedding)
            .ok_or_else(|| Error::upstream(&self.model, "no embedding in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SemanticCacheConfig {
        SemanticCacheConfig {
            enabled: true,
            similarity_threshold: 0.85,
            endpoint: "https://api.openai.com/v1/".into(),
            credential: "sk-test".into(),
            model: "text-embedding-ada-002".into(),
        }
    }

    #[test]
    fn construction_requires_credential() {
        let mut cfg = config();
        cfg.credential.clear();
        assert!(EmbeddingClient::new(&cfg).is_err());
    }

    #[test]
    fn url_is_joined_without_double_slash() {
        let client = EmbeddingClient::new(&config()).unwrap();
        assert_eq!(
            client.embeddings_url(),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_request() {
        let client = EmbeddingClient::new(&config()).unwrap();
        let err = client.embed("").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
