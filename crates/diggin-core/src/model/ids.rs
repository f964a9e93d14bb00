use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Separator placed between the normalized artist and title.
///
/// Chosen because it does not show up in Last.fm artist or album names.
pub const NATURAL_KEY_SEPARATOR: char = '|';

/// Content-addressed identifier for an album.
///
/// Derived from the album's natural key (artist, title): both parts are
/// trimmed and lowercased, joined with [`NATURAL_KEY_SEPARATOR`], hashed
/// with SHA-256, and the first 16 bytes of the digest become the UUID.
/// Ingesting the same logical album twice therefore converges on one
/// record.
///
/// The identifier is an ingestion convenience, not a security boundary. It
/// is collision-tolerant in practice but nothing stops crafted input from
/// colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlbumId(Uuid);

impl AlbumId {
    /// Compute the identifier for an (artist, title) natural key.
    #[must_use]
    pub fn from_natural_key(artist: &str, title: &str) -> Self {
        let key = natural_key(artist, title);
        let digest = Sha256::digest(key.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(Uuid::from_bytes(bytes))
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

/// Normalize an (artist, title) pair into the string that gets hashed.
#[must_use]
pub fn natural_key(artist: &str, title: &str) -> String {
    format!(
        "{}{}{}",
        artist.trim().to_lowercase(),
        NATURAL_KEY_SEPARATOR,
        title.trim().to_lowercase()
    )
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlbumId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl AsRef<Uuid> for AlbumId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}
