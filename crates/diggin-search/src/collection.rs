//! The vector collection contract.

use async_trait::async_trait;
use diggin_core::{AlbumId, AlbumRecord, SearchHit};

use crate::error::StoreResult;

/// A keyed store of album records with nearest-neighbour search.
///
/// Implementations must never make a record visible to [`search`] without
/// its vector: `upsert` validates the record before writing it.
///
/// [`search`]: VectorCollection::search
#[async_trait]
pub trait VectorCollection: Send + Sync + std::fmt::Debug {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Create the backing collection if it does not exist yet. Idempotent.
    async fn ensure_collection(&self) -> StoreResult<()>;

    /// Insert or replace the record stored under `record.id`.
    async fn upsert(&self, record: &AlbumRecord) -> StoreResult<()>;

    /// Return up to `top_k` records ranked by similarity to `query`.
    async fn search(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<SearchHit>>;

    /// Fetch a single record, vector included.
    async fn get(&self, id: &AlbumId) -> StoreResult<Option<AlbumRecord>>;

    /// Number of records in the collection.
    async fn count(&self) -> StoreResult<usize>;
}
