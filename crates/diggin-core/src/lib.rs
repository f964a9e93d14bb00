//! Core domain model for crate-diggin.
//!
//! This crate defines the album record that flows through ingestion and
//! lands in the vector collection, together with the deterministic,
//! content-addressed identifier derived from an album's natural key.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{AlbumId, AlbumRecord, SearchHit, EMBEDDING_DIMENSIONS};
