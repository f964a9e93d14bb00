pub mod album;
pub mod ids;

pub use album::{AlbumRecord, SearchHit, EMBEDDING_DIMENSIONS};
pub use ids::AlbumId;
