//! Embedding generation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

/// Turns description text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Embed `text`.
    ///
    /// Fails with [`IngestError::EmptyDescription`] for blank input and
    /// [`IngestError::EmbeddingUnavailable`] when the provider cannot
    /// produce a vector of the expected length.
    async fn embed(&self, text: &str) -> IngestResult<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// [`Embedder`] backed by an Ollama server's `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create an embedder for `model` on the Ollama server at `base_url`
    /// (e.g. `http://localhost:11434`), expecting vectors of `dimensions`.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> IngestResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> IngestResult<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IngestError::EmptyDescription {
                natural_key: String::new(),
            });
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| IngestError::EmbeddingUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::EmbeddingUnavailable(format!(
                "{url} returned {status}: {body}"
            )));
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| IngestError::EmbeddingUnavailable(format!("unreadable response: {e}")))?;

        check_dimensions(payload.embedding, self.dimensions)
    }
}

/// Accept `vector` only when it has exactly `expected` elements.
pub fn check_dimensions(vector: Vec<f32>, expected: usize) -> IngestResult<Vec<f32>> {
    if vector.len() != expected {
        return Err(IngestError::EmbeddingUnavailable(format!(
            "model returned {} dimensions, expected {}",
            vector.len(),
            expected
        )));
    }
    Ok(vector)
}
