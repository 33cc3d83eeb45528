//! Enrichment provider clients.
//!
//! The embedding and entity-extraction services are consumed as black
//! boxes over HTTP. Every call carries a request timeout and a bounded
//! response cap; a timeout or oversize response surfaces as a retryable
//! job failure, never a hang or a fatal error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use newsloom_core::{defaults, EmbeddingClient, EntityExtractor, EntityRef, Error, Result};

/// HTTP embedding client (Ollama-compatible `/api/embeddings` shape).
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
    max_response_bytes: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    /// Create a client against `base_url` with defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: defaults::EMBED_MODEL.to_string(),
            dimension: defaults::EMBED_DIMENSION,
            timeout: Duration::from_secs(defaults::PROVIDER_TIMEOUT_SECS),
            max_response_bytes: defaults::PROVIDER_MAX_RESPONSE_BYTES,
        }
    }

    /// Create from environment.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `EMBED_API_URL` | `http://localhost:11434` | Embedding endpoint base |
    /// | `EMBED_MODEL` | `nomic-embed-text` | Model name |
    /// | `EMBED_TIMEOUT_SECS` | `30` | Request timeout |
    pub fn from_env() -> Self {
        let base_url = std::env::var("EMBED_API_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        let mut client = Self::new(base_url);
        if let Ok(model) = std::env::var("EMBED_MODEL") {
            client.model = model;
        }
        if let Some(timeout) = std::env::var("EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            client.timeout = Duration::from_secs(timeout);
        }
        client
    }

    /// Override the expected output dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Override the response size cap.
    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }
}

/// Read a response body, enforcing the byte cap before parsing.
async fn bounded_body(response: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>> {
    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(Error::Request(format!(
                "response of {len} bytes exceeds cap of {max_bytes}"
            )));
        }
    }
    let body = response.bytes().await?;
    if body.len() > max_bytes {
        return Err(Error::Request(format!(
            "response of {} bytes exceeds cap of {max_bytes}",
            body.len()
        )));
    }
    Ok(body.to_vec())
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .timeout(self.timeout)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Embedding(format!(
                "embedding API returned {}",
                response.status()
            )));
        }

        let body = bounded_body(response, self.max_response_bytes).await?;
        let parsed: EmbeddingResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Embedding(format!("unparseable embedding response: {e}")))?;

        if parsed.embedding.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                parsed.embedding.len()
            )));
        }

        debug!(
            subsystem = "providers",
            component = "embedding",
            op = "embed",
            prompt_len = text.len(),
            "Embedded text"
        );
        Ok(parsed.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// HTTP entity extraction client.
pub struct HttpEntityExtractor {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_response_bytes: usize,
}

#[derive(Serialize)]
struct ExtractionRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ExtractionResponse {
    entities: Vec<WireEntity>,
}

#[derive(Deserialize)]
struct WireEntity {
    id: String,
    label: String,
    #[serde(rename = "type")]
    kind: String,
}

impl HttpEntityExtractor {
    /// Create a client against `base_url` with defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(defaults::PROVIDER_TIMEOUT_SECS),
            max_response_bytes: defaults::PROVIDER_MAX_RESPONSE_BYTES,
        }
    }

    /// Create from the `ENTITY_API_URL` environment variable.
    pub fn from_env() -> Self {
        let base_url = std::env::var("ENTITY_API_URL")
            .unwrap_or_else(|_| "http://localhost:8089".to_string());
        Self::new(base_url)
    }
}

#[async_trait]
impl EntityExtractor for HttpEntityExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<EntityRef>> {
        let response = self
            .client
            .post(format!("{}/v1/extract", self.base_url))
            .timeout(self.timeout)
            .json(&ExtractionRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Extraction(format!(
                "entity API returned {}",
                response.status()
            )));
        }

        let body = bounded_body(response, self.max_response_bytes).await?;
        let parsed: ExtractionResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Extraction(format!("unparseable extraction response: {e}")))?;

        Ok(parsed
            .entities
            .into_iter()
            .map(|e| EntityRef {
                id: e.id,
                label: e.label,
                kind: e.kind,
            })
            .collect())
    }
}

/// Deterministic mock embedding client for tests: hashes the text into a
/// stable pseudo-embedding.
pub struct MockEmbeddingClient {
    dimension: usize,
}

impl MockEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimension] += (byte as f32) / 255.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mock entity extractor returning a fixed list.
pub struct MockEntityExtractor {
    entities: Vec<EntityRef>,
}

impl MockEntityExtractor {
    pub fn new(entities: Vec<EntityRef>) -> Self {
        Self { entities }
    }

    pub fn empty() -> Self {
        Self { entities: vec![] }
    }
}

#[async_trait]
impl EntityExtractor for MockEntityExtractor {
    async fn extract(&self, _text: &str) -> Result<Vec<EntityRef>> {
        Ok(self.entities.clone())
    }
}
