use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ids::AlbumId;

/// Dimension of the description embeddings stored alongside each album.
pub const EMBEDDING_DIMENSIONS: usize = 768;

/// An album as stored in (and returned from) the vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub id: AlbumId,

    /// Artist display name.
    pub artist: String,

    /// Album title.
    pub title: String,

    /// Enriched free text; the only input to the embedding model.
    pub description: String,

    /// Cover art URL, empty when unknown.
    #[serde(default)]
    pub cover_url: String,

    /// Where the metadata came from (a Last.fm page), empty when unknown.
    #[serde(default)]
    pub source_url: String,

    /// Description embedding. Empty until embedding succeeds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector: Vec<f32>,
}

impl AlbumRecord {
    /// Create a record without a vector. The id is derived from the
    /// natural key.
    #[must_use]
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let artist = artist.into().trim().to_string();
        let title = title.into().trim().to_string();
        Self {
            id: AlbumId::from_natural_key(&artist, &title),
            artist,
            title,
            description: description.into(),
            cover_url: String::new(),
            source_url: String::new(),
            vector: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_cover_url(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = cover_url.into();
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = source_url.into();
        self
    }

    #[must_use]
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = vector;
        self
    }

    /// Whether the record carries an embedding.
    #[must_use]
    pub fn has_vector(&self) -> bool {
        !self.vector.is_empty()
    }

    /// Check that the record may become visible to search.
    ///
    /// A record is searchable only with a non-empty natural key, a
    /// non-empty description, and a vector of exactly `dimensions` floats.
    pub fn validate_searchable(&self, dimensions: usize) -> Result<()> {
        let reject = |reason: String| Error::InvalidRecord {
            id: self.id.to_string(),
            reason,
        };

        if self.artist.trim().is_empty() || self.title.trim().is_empty() {
            return Err(reject("artist and title must not be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(reject("description must not be empty".to_string()));
        }
        if self.vector.len() != dimensions {
            return Err(reject(format!(
                "vector has {} dimensions, expected {}",
                self.vector.len(),
                dimensions
            )));
        }
        Ok(())
    }
}

/// A record returned by nearest-neighbour search, with its similarity to
/// the query vector. The score only exists on results and is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: AlbumRecord,
    pub score: f32,
}
