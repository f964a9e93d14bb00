//! In-process vector collection.
//!
//! Keeps records in a `HashMap` behind an async `RwLock` and ranks them by
//! cosine similarity. Useful for offline runs (`diggin --memory`) and as the
//! store in tests; nothing survives the process.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use diggin_core::{AlbumId, AlbumRecord, SearchHit, EMBEDDING_DIMENSIONS};

use crate::collection::VectorCollection;
use crate::error::{StoreError, StoreResult};

/// In-memory [`VectorCollection`].
#[derive(Debug)]
pub struct InMemoryCollection {
    name: String,
    dimensions: usize,
    /// `None` until `ensure_collection` runs.
    records: RwLock<Option<HashMap<AlbumId, AlbumRecord>>>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            dimensions,
            records: RwLock::new(None),
        }
    }

    /// Snapshot of every stored record, ordered by id.
    pub async fn records(&self) -> Vec<AlbumRecord> {
        let guard = self.records.read().await;
        let mut records: Vec<AlbumRecord> = guard
            .as_ref()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| r.id);
        records
    }

    fn missing(&self) -> StoreError {
        StoreError::MissingCollection(self.name.clone())
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new("albums", EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl VectorCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        let mut guard = self.records.write().await;
        if guard.is_none() {
            log::info!("Creating in-memory collection {}", self.name);
            *guard = Some(HashMap::new());
        }
        Ok(())
    }

    async fn upsert(&self, record: &AlbumRecord) -> StoreResult<()> {
        record.validate_searchable(self.dimensions)?;
        let mut guard = self.records.write().await;
        let records = guard.as_mut().ok_or_else(|| self.missing())?;
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<SearchHit>> {
        let guard = self.records.read().await;
        let records = guard.as_ref().ok_or_else(|| self.missing())?;

        let mut hits: Vec<SearchHit> = records
            .values()
            .filter(|r| r.vector.len() == query.len())
            .map(|r| SearchHit {
                score: cosine_similarity(query, &r.vector),
                record: r.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn get(&self, id: &AlbumId) -> StoreResult<Option<AlbumRecord>> {
        let guard = self.records.read().await;
        let records = guard.as_ref().ok_or_else(|| self.missing())?;
        Ok(records.get(id).cloned())
    }

    async fn count(&self) -> StoreResult<usize> {
        let guard = self.records.read().await;
        Ok(guard.as_ref().ok_or_else(|| self.missing())?.len())
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either is zero.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
