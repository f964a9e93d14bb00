//! Vector search for crate-diggin.
//!
//! Defines the [`VectorCollection`] contract the ingestion pipeline writes
//! through, with a Qdrant REST adapter for production and an in-process
//! adapter for offline runs and tests.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod collection;
pub mod error;
pub mod memory;
pub mod qdrant;

pub use collection::VectorCollection;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryCollection;
pub use qdrant::QdrantCollection;
