//! The album metadata source contract.

use async_trait::async_trait;

/// An album returned by a tag's "top albums" listing.
///
/// Every field is trimmed; optional fields are empty strings when the
/// source did not provide them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumCandidate {
    pub artist: String,
    pub title: String,
    /// Page for the album at the source.
    pub source_url: String,
    /// Large cover image, if the listing had one.
    pub cover_url: String,
}

impl AlbumCandidate {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into().trim().to_string(),
            title: title.into().trim().to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into().trim().to_string();
        self
    }

    #[must_use]
    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = url.into().trim().to_string();
        self
    }

    /// Whether both halves of the natural key are present.
    pub fn has_natural_key(&self) -> bool {
        !self.artist.is_empty() && !self.title.is_empty()
    }
}

/// Extra album information from a "details" call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumDetails {
    /// Wiki summary as published by the source (may contain HTML).
    pub summary: String,
    /// Free-form publication date of the wiki entry, e.g.
    /// `"27 Jul 2009, 10:54"`.
    pub published: String,
    /// Genre/style tag names, in source order.
    pub tags: Vec<String>,
}

/// Where the scheduler gets albums from.
///
/// Both calls degrade instead of failing: a tag that cannot be listed
/// yields no candidates, and details that cannot be fetched yield `None`.
#[async_trait]
pub trait AlbumSource: Send + Sync + std::fmt::Debug {
    /// Top albums for `tag` on result page `page` (1-based).
    async fn top_albums(&self, tag: &str, page: u32) -> Vec<AlbumCandidate>;

    /// Best-effort details for one album.
    async fn album_details(&self, artist: &str, title: &str) -> Option<AlbumDetails>;
}
