//! Last.fm metadata source.
//!
//! Lists the top albums for a tag (`tag.getTopAlbums`) and fetches wiki
//! summaries and tags for a single album (`album.getInfo`). Last.fm's JSON
//! is loosely shaped: single-element lists arrive as bare objects, empty
//! objects arrive as `""`, and errors arrive as HTTP 200 with an `error`
//! code. The response models below absorb all of that, so a field the API
//! leaves out or mangles reads as "not present" instead of failing the
//! whole response.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{IngestError, IngestResult};
use crate::resilience::RateLimiter;
use crate::source::{AlbumCandidate, AlbumDetails, AlbumSource};

pub const LASTFM_API_BASE: &str = "http://ws.audioscrobbler.com/2.0/";

const SOURCE_NAME: &str = "Last.fm";

/// Position of the "large" size in an album's `image` list.
const LARGE_IMAGE_INDEX: usize = 2;

/// Last.fm error code for "Rate limit exceeded".
const RATE_LIMIT_ERROR_CODE: i64 = 29;

/// Default number of albums requested per tag.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

/// Read a field as `T`, or `None` when it has any other shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Read a list that Last.fm may send as an array, a bare object (one
/// element), or something else entirely (no elements). Elements that do
/// not fit `T` are dropped.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// API response types (private -- Last.fm nests JSON awkwardly)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default, deserialize_with = "lenient")]
    error: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    message: Option<String>,
}

impl ApiError {
    fn into_error(self) -> Option<IngestError> {
        let code = self.error?;
        if code == RATE_LIMIT_ERROR_CODE {
            return Some(IngestError::RateLimited {
                source_name: SOURCE_NAME.to_string(),
            });
        }
        Some(IngestError::Transport {
            source_name: SOURCE_NAME.to_string(),
            message: format!(
                "API error {}: {}",
                code,
                self.message.unwrap_or_default()
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TopAlbumsResponse {
    #[serde(default, deserialize_with = "lenient")]
    albums: Option<TopAlbums>,
    #[serde(flatten)]
    api_error: ApiError,
}

#[derive(Debug, Deserialize)]
struct TopAlbums {
    #[serde(default, deserialize_with = "one_or_many")]
    album: Vec<RawAlbum>,
}

#[derive(Debug, Deserialize)]
struct RawAlbum {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    artist: Option<RawArtist>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    image: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawArtist {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(rename = "#text", default, deserialize_with = "lenient")]
    text: Option<String>,
}

impl RawAlbum {
    /// Convert to a candidate, or `None` when artist or title is missing.
    fn into_candidate(self) -> Option<AlbumCandidate> {
        let artist = trimmed(self.artist.and_then(|a| a.name));
        let title = trimmed(self.name);
        if artist.is_empty() || title.is_empty() {
            log::debug!(
                "Skipping Last.fm album without artist/title (artist={:?}, title={:?})",
                artist,
                title
            );
            return None;
        }

        let cover_url = self
            .image
            .into_iter()
            .nth(LARGE_IMAGE_INDEX)
            .and_then(|image| image.text);

        Some(
            AlbumCandidate::new(artist, title)
                .with_source_url(trimmed(self.url))
                .with_cover_url(trimmed(cover_url)),
        )
    }
}

#[derive(Debug, Deserialize)]
struct AlbumInfoResponse {
    #[serde(default, deserialize_with = "lenient")]
    album: Option<RawAlbumInfo>,
    #[serde(flatten)]
    api_error: ApiError,
}

#[derive(Debug, Deserialize)]
struct RawAlbumInfo {
    #[serde(default, deserialize_with = "lenient")]
    wiki: Option<RawWiki>,
    #[serde(default, deserialize_with = "lenient")]
    tags: Option<RawTags>,
}

#[derive(Debug, Deserialize)]
struct RawWiki {
    #[serde(default, deserialize_with = "lenient")]
    summary: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTags {
    #[serde(default, deserialize_with = "one_or_many")]
    tag: Vec<RawTag>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
}

impl RawAlbumInfo {
    fn into_details(self) -> AlbumDetails {
        let (summary, published) = self
            .wiki
            .map(|w| (trimmed(w.summary), trimmed(w.published)))
            .unwrap_or_default();
        let tags = self
            .tags
            .map(|t| t.tag)
            .unwrap_or_default()
            .into_iter()
            .map(|t| trimmed(t.name))
            .filter(|name| !name.is_empty())
            .collect();

        AlbumDetails {
            summary,
            published,
            tags,
        }
    }
}

fn malformed(e: &serde_json::Error) -> IngestError {
    IngestError::MalformedResponse {
        source_name: SOURCE_NAME.to_string(),
        message: e.to_string(),
    }
}

/// Parse a `tag.getTopAlbums` response body.
///
/// A body without `albums` or without `albums.album` yields no
/// candidates. Albums missing an artist or title are skipped.
pub fn parse_top_albums(body: &str) -> IngestResult<Vec<AlbumCandidate>> {
    let response: TopAlbumsResponse = serde_json::from_str(body).map_err(|e| malformed(&e))?;
    if let Some(err) = response.api_error.into_error() {
        return Err(err);
    }

    let Some(albums) = response.albums else {
        log::debug!("Last.fm top albums response has no albums");
        return Ok(Vec::new());
    };

    Ok(albums
        .album
        .into_iter()
        .filter_map(RawAlbum::into_candidate)
        .collect())
}

/// Parse an `album.getInfo` response body. `None` when the body has no
/// `album` object.
pub fn parse_album_info(body: &str) -> IngestResult<Option<AlbumDetails>> {
    let response: AlbumInfoResponse = serde_json::from_str(body).map_err(|e| malformed(&e))?;
    if let Some(err) = response.api_error.into_error() {
        return Err(err);
    }
    Ok(response.album.map(RawAlbumInfo::into_details))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Last.fm API client.
///
/// Wraps an HTTP client, an API key, and a rate limiter. The Last.fm API
/// allows up to 5 requests per second for non-commercial use.
#[derive(Clone)]
pub struct LastFmClient {
    http: Client,
    api_key: String,
    base_url: String,
    page_size: u32,
    rate_limiter: RateLimiter,
}

impl fmt::Debug for LastFmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LastFmClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

impl LastFmClient {
    /// Create a new Last.fm API client.
    ///
    /// The `api_key` must be a valid Last.fm API key obtained from
    /// <https://www.last.fm/api/account/create>. Every request is bounded
    /// by `timeout`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> IngestResult<Self> {
        let http = Client::builder()
            .user_agent("crate-diggin/0.1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            page_size: DEFAULT_PAGE_SIZE,
            rate_limiter: RateLimiter::new(5),
        })
    }

    /// Number of albums requested per tag.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn get(&self, params: &[(&str, &str)]) -> IngestResult<String> {
        self.rate_limiter.acquire().await;

        let response = self
            .http
            .get(&self.base_url)
            .query(params)
            .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|e| IngestError::Transport {
                source_name: SOURCE_NAME.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(IngestError::RateLimited {
                source_name: SOURCE_NAME.to_string(),
            });
        }
        if !status.is_success() {
            return Err(IngestError::Transport {
                source_name: SOURCE_NAME.to_string(),
                message: format!("status {status}"),
            });
        }

        Ok(response.text().await?)
    }

    /// Call `tag.getTopAlbums` for `tag` and `page`.
    pub async fn fetch_top_albums(&self, tag: &str, page: u32) -> IngestResult<Vec<AlbumCandidate>> {
        let page = page.to_string();
        let limit = self.page_size.to_string();
        let body = self
            .get(&[
                ("method", "tag.gettopalbums"),
                ("tag", tag),
                ("page", &page),
                ("limit", &limit),
            ])
            .await?;
        parse_top_albums(&body)
    }

    /// Call `album.getInfo` for one album.
    pub async fn fetch_album_info(&self, artist: &str, title: &str) -> IngestResult<Option<AlbumDetails>> {
        let body = self
            .get(&[
                ("method", "album.getinfo"),
                ("artist", artist),
                ("album", title),
            ])
            .await?;
        parse_album_info(&body)
    }
}

#[async_trait]
impl AlbumSource for LastFmClient {
    async fn top_albums(&self, tag: &str, page: u32) -> Vec<AlbumCandidate> {
        match self.fetch_top_albums(tag, page).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!(
                    "Failed to get Last.fm top albums for tag {} (page {}): {}",
                    tag,
                    page,
                    e
                );
                Vec::new()
            }
        }
    }

    async fn album_details(&self, artist: &str, title: &str) -> Option<AlbumDetails> {
        match self.fetch_album_info(artist, title).await {
            Ok(details) => details,
            Err(e) => {
                log::warn!(
                    "Failed to get Last.fm album info for {} - {}: {}",
                    artist,
                    title,
                    e
                );
                None
            }
        }
    }
}
