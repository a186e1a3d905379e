use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gamedex_core::config::{EmbeddingConfig, VectorIndexConfig};
use gamedex_core::domain::context::{Passage, RetrievedContext};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector index query failed: {0}")]
    Index(String),
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IndexMatch {
    #[serde(default)]
    pub id: Option<String>,
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u32,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>, RetrievalError>;
}

/// Embeds a query and turns the nearest index matches into passages.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    dimension: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, dimension: usize) -> Self {
        Self { embedder, index, dimension }
    }

    pub async fn retrieve(&self, query: &str, top_k: u32) -> Result<RetrievedContext, RetrievalError> {
        let vector = self.embedder.embed(query).await?;
        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let matches = self.index.query(vector, top_k, true).await?;
        let passages = matches
            .into_iter()
            .filter_map(|entry| match entry.metadata.get("text").and_then(Value::as_str) {
                Some(text) if !text.trim().is_empty() => {
                    Some(Passage { text: text.to_string(), score: entry.score })
                }
                _ => {
                    warn!(
                        event_name = "retrieval.match.missing_text",
                        match_id = entry.id.as_deref().unwrap_or("unknown"),
                        score = entry.score,
                        "skipping index match without usable text metadata"
                    );
                    None
                }
            })
            .collect();

        Ok(RetrievedContext::new(passages))
    }
}

/// Calls an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| RetrievalError::Embedding(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest { model: &self.model, input: text });
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response =
            builder.send().await.map_err(|error| RetrievalError::Embedding(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!("status {}: {body}", status.as_u16())));
        }

        let decoded: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| RetrievalError::Embedding(error.to_string()))?;

        decoded
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| RetrievalError::Embedding("response contained no embedding".to_string()))
    }
}

/// Queries a Pinecone-style index over its data-plane REST API.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: SecretString,
    namespace: Option<String>,
}

impl PineconeIndex {
    pub fn from_config(config: &VectorIndexConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| RetrievalError::Index(error.to_string()))?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            namespace: config.namespace.clone(),
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: u32,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>, RetrievalError> {
        let body = IndexQuery {
            vector,
            top_k,
            include_metadata,
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| RetrievalError::Index(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Index(format!("status {}: {body}", status.as_u16())));
        }

        let decoded: IndexQueryResponse =
            response.json().await.map_err(|error| RetrievalError::Index(error.to_string()))?;
        Ok(decoded.matches)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexQuery<'a> {
    vector: Vec<f32>,
    top_k: u32,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct IndexQueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}
