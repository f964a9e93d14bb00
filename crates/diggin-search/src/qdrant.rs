//! Qdrant REST adapter.
//!
//! Talks to Qdrant's HTTP API directly: one collection with a single
//! unnamed cosine vector, keyword payload indices on `artist` and `title`,
//! and the remaining album fields as plain payload.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use diggin_core::{AlbumId, AlbumRecord, SearchHit};

use crate::collection::VectorCollection;
use crate::error::{StoreError, StoreResult};

/// Payload fields that get a keyword index so they can be filtered on.
const FILTERABLE_FIELDS: [&str; 2] = ["artist", "title"];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Default, Deserialize)]
struct CollectionInfo {
    /// Indexed payload fields, keyed by field name.
    #[serde(default)]
    payload_schema: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct AlbumPayload {
    #[serde(default)]
    artist: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cover_url: String,
    #[serde(default)]
    source_url: String,
}

#[derive(Debug, Serialize)]
struct PointStruct<'a> {
    id: String,
    vector: &'a [f32],
    payload: AlbumPayload,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    #[serde(default)]
    score: f32,
    payload: Option<AlbumPayload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

impl ScoredPoint {
    fn into_record(self) -> StoreResult<AlbumRecord> {
        let raw_id = match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let id: AlbumId = raw_id
            .parse()
            .map_err(|e| StoreError::Malformed(format!("point id {raw_id}: {e}")))?;
        let payload = self
            .payload
            .ok_or_else(|| StoreError::Malformed(format!("point {raw_id} has no payload")))?;

        Ok(AlbumRecord {
            id,
            artist: payload.artist,
            title: payload.title,
            description: payload.description,
            cover_url: payload.cover_url,
            source_url: payload.source_url,
            vector: self.vector.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`VectorCollection`] backed by a Qdrant server.
#[derive(Debug, Clone)]
pub struct QdrantCollection {
    http: Client,
    base_url: String,
    name: String,
    dimensions: usize,
}

impl QdrantCollection {
    /// Create an adapter for collection `name` on the server at `base_url`
    /// (e.g. `http://localhost:6333`). Every request is bounded by `timeout`.
    pub fn new(
        base_url: &str,
        name: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("crate-diggin/0.1.0")
            .build()
            .map_err(|e| StoreError::Unavailable {
                endpoint: base_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.into(),
            dimensions,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.name)
    }

    /// Send a request, turning transport failures and non-success statuses
    /// into [`StoreError`]s.
    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await.map_err(|e| StoreError::Unavailable {
            endpoint: self.base_url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: Response) -> StoreResult<T> {
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(envelope.result)
    }

    /// The collection's info, or `None` when it does not exist.
    async fn collection_info(&self) -> StoreResult<Option<CollectionInfo>> {
        match self.send(self.http.get(self.collection_url())).await {
            Ok(response) => Ok(Some(Self::read(response).await?)),
            Err(StoreError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_collection(&self) -> StoreResult<()> {
        let body = json!({
            "vectors": { "size": self.dimensions, "distance": "Cosine" }
        });
        match self.send(self.http.put(self.collection_url()).json(&body)).await {
            Ok(_) => Ok(()),
            // Someone else created it between our check and our create.
            Err(StoreError::Api { status, .. }) if status == StatusCode::CONFLICT.as_u16() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn create_keyword_index(&self, field: &str) -> StoreResult<()> {
        let body = json!({ "field_name": field, "field_schema": "keyword" });
        self.send(
            self.http
                .put(format!("{}/index?wait=true", self.collection_url()))
                .json(&body),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorCollection for QdrantCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        let indexed = match self.collection_info().await? {
            Some(info) => info.payload_schema,
            None => {
                log::info!(
                    "Creating Qdrant collection {} ({} dimensions)",
                    self.name,
                    self.dimensions
                );
                self.create_collection().await?;
                HashMap::new()
            }
        };

        // Indices are reconciled on every call, not only at creation.
        for field in FILTERABLE_FIELDS {
            if !indexed.contains_key(field) {
                log::info!("Creating keyword index on {}.{}", self.name, field);
                self.create_keyword_index(field).await?;
            }
        }
        Ok(())
    }

    async fn upsert(&self, record: &AlbumRecord) -> StoreResult<()> {
        record.validate_searchable(self.dimensions)?;

        let point = PointStruct {
            id: record.id.to_string(),
            vector: &record.vector,
            payload: AlbumPayload {
                artist: record.artist.clone(),
                title: record.title.clone(),
                description: record.description.clone(),
                cover_url: record.cover_url.clone(),
                source_url: record.source_url.clone(),
            },
        };

        // wait=true: return only once the point is indexed.
        self.send(
            self.http
                .put(format!("{}/points?wait=true", self.collection_url()))
                .json(&json!({ "points": [point] })),
        )
        .await?;
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<SearchHit>> {
        let body = json!({
            "vector": query,
            "limit": top_k,
            "with_payload": true,
            "with_vector": true,
        });
        let response = self
            .send(
                self.http
                    .post(format!("{}/points/search", self.collection_url()))
                    .json(&body),
            )
            .await?;

        let points: Vec<ScoredPoint> = Self::read(response).await?;
        points
            .into_iter()
            .map(|p| {
                let score = p.score;
                p.into_record().map(|record| SearchHit { record, score })
            })
            .collect()
    }

    async fn get(&self, id: &AlbumId) -> StoreResult<Option<AlbumRecord>> {
        let body = json!({
            "ids": [id.to_string()],
            "with_payload": true,
            "with_vector": true,
        });
        let response = self
            .send(
                self.http
                    .post(format!("{}/points", self.collection_url()))
                    .json(&body),
            )
            .await?;

        let points: Vec<ScoredPoint> = Self::read(response).await?;
        points.into_iter().next().map(ScoredPoint::into_record).transpose()
    }

    async fn count(&self) -> StoreResult<usize> {
        let response = self
            .send(
                self.http
                    .post(format!("{}/points/count", self.collection_url()))
                    .json(&json!({ "exact": true })),
            )
            .await?;
        let result: CountResult = Self::read(response).await?;
        Ok(result.count)
    }
}
