//! HTTP-backed [`Embedder`]: the query service's concrete implementation of
//! the embedding contract `extraction::embedding` only declares a trait for
//! (spec §6 "Embedding contract", §9 "global singletons become
//! dependency-injected values").
//!
//! Request shape and retry follow `extraction::llm::AnthropicGateway`'s
//! reqwest client pattern. The `search_document:`/`search_query:`
//! instruction prefixes match the asymmetric encoder convention used by
//! `examples/original_source/packages/pipeline/src/embeddings/local_embedder.py`
//! (`document_prefix`/`query_prefix`), carried over here against a remote
//! embedding endpoint instead of an in-process sentence-transformers model.

use async_trait::async_trait;
use extraction::stores::VECTOR_DIMENSION;
use extraction::{embedding::Embedder, ExtractionError, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const DOCUMENT_PREFIX: &str = "search_document: ";
const QUERY_PREFIX: &str = "search_query: ";

pub struct HttpEmbedder {
    client: Client,
    endpoint_url: String,
    api_key: Option<SecretString>,
}

impl HttpEmbedder {
    pub fn new(endpoint_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint_url: endpoint_url.into(),
            api_key: api_key.map(SecretString::from),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self.client.post(format!("{}/embed", self.endpoint_url)).json(&EmbedRequest { input: text });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?
            .error_for_status()
            .map_err(|e| ExtractionError::Storage(Box::new(e)))?;

        let parsed: EmbedResponse = response.json().await.map_err(|e| ExtractionError::Storage(Box::new(e)))?;

        if parsed.embedding.len() != VECTOR_DIMENSION {
            return Err(ExtractionError::Validation(format!(
                "embedding endpoint returned {} dimensions, expected {VECTOR_DIMENSION}",
                parsed.embedding.len()
            )));
        }
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&format!("{DOCUMENT_PREFIX}{text}")).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&format!("{QUERY_PREFIX}{text}")).await
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}
