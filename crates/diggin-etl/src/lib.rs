//! Ingestion pipeline for crate-diggin.
//!
//! Sweeps Last.fm tags for albums, enriches each one with a description,
//! embeds the description, and upserts the result into a vector
//! collection. The [`IngestScheduler`] repeats that forever; the
//! [`SeedLoader`] populates a fresh collection from a fixed catalog.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod describe;
pub mod embed;
pub mod error;
pub mod lastfm;
pub mod resilience;
pub mod scheduler;
pub mod seed;
pub mod source;

pub use config::{Config, ScheduleConfig};
pub use describe::build_description;
pub use embed::{Embedder, OllamaEmbedder};
pub use error::{IngestError, IngestResult};
pub use lastfm::LastFmClient;
pub use scheduler::{IngestScheduler, PageSelector, SchedulerSettings, SchedulerState, SweepReport};
pub use seed::{starter_pack, SeedAlbum, SeedLoader, SeedReport};
pub use source::{AlbumCandidate, AlbumDetails, AlbumSource};
