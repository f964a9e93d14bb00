//! One-shot bootstrap of the album collection.
//!
//! Fills an empty collection with a small hand-described starter pack so
//! search has something to work with before the first sweep finishes.

use std::fmt;
use std::sync::Arc;

use diggin_core::AlbumRecord;
use diggin_search::VectorCollection;

use crate::embed::Embedder;
use crate::error::IngestResult;

/// A catalog entry for the seed loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedAlbum {
    pub artist: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

const STARTER_PACK: [SeedAlbum; 10] = [
    SeedAlbum {
        artist: "Nas",
        title: "Illmatic",
        description: "Raw 90s boom-bap hip-hop, gritty new york streets, poetic lyricism, jazz samples, urban storytelling",
    },
    SeedAlbum {
        artist: "Joy Division",
        title: "Unknown Pleasures",
        description: "Post-punk, gothic rock, melancholic, dark atmosphere, industrial textures, bass-heavy, minimalist",
    },
    SeedAlbum {
        artist: "Portishead",
        title: "Dummy",
        description: "Trip-hop, cinematic, noir, bristol sound, haunting female vocals, spy movie vibes, downtempo, experimental",
    },
    SeedAlbum {
        artist: "Daft Punk",
        title: "Homework",
        description: "French house, raw techno, chicago house influence, lo-fi dance, repetitive beats, funk samples, basement party vibes",
    },
    SeedAlbum {
        artist: "Metallica",
        title: "Ride the Lightning",
        description: "Thrash metal, aggressive, fast tempo, complex guitar solos, electric, angry, 80s metal",
    },
    SeedAlbum {
        artist: "Miles Davis",
        title: "Kind of Blue",
        description: "Cool jazz, modal jazz, relaxing, sophisticated, trumpet, saxophone, smoke-filled lounge vibe, masterpiece",
    },
    SeedAlbum {
        artist: "Fleetwood Mac",
        title: "Rumours",
        description: "Soft rock, pop rock, emotional, relationship drama, harmonies, acoustic guitar, california 70s vibes",
    },
    SeedAlbum {
        artist: "Tame Impala",
        title: "Currents",
        description: "Psychedelic pop, synth-pop, dreamy, hazy, psychedelic rock, introspective, modern indie",
    },
    SeedAlbum {
        artist: "Aphex Twin",
        title: "Selected Ambient Works 85-92",
        description: "Ambient techno, idm, electronic, atmospheric, ethereal, warm analog synths, relaxing focus music",
    },
    SeedAlbum {
        artist: "A Tribe Called Quest",
        title: "The Low End Theory",
        description: "Jazz rap, conscious hip-hop, groovy basslines, afrocentric, positive vibes, 90s classic",
    },
];

/// The built-in starter pack.
pub fn starter_pack() -> &'static [SeedAlbum] {
    &STARTER_PACK
}

/// Result of a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Albums upserted.
    pub seeded: usize,
    /// Of those, albums whose stored vector was reused instead of
    /// re-embedded.
    pub reused: usize,
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Successfully seeded {} albums into the crates!", self.seeded)
    }
}

/// Seeds a collection from a fixed catalog.
#[derive(Debug)]
pub struct SeedLoader {
    embedder: Arc<dyn Embedder>,
    collection: Arc<dyn VectorCollection>,
}

impl SeedLoader {
    pub fn new(embedder: Arc<dyn Embedder>, collection: Arc<dyn VectorCollection>) -> Self {
        Self {
            embedder,
            collection,
        }
    }

    /// Ensure the collection exists and upsert every album in `catalog`.
    ///
    /// An album already stored with the same description keeps its vector;
    /// everything else is embedded. Any failure stops the run.
    pub async fn seed(&self, catalog: &[SeedAlbum]) -> IngestResult<SeedReport> {
        self.collection.ensure_collection().await?;

        let mut report = SeedReport::default();
        for album in catalog {
            let mut record = AlbumRecord::new(album.artist, album.title, album.description);

            let existing = self.collection.get(&record.id).await?;
            match existing {
                Some(stored) if stored.has_vector() && stored.description == record.description => {
                    log::debug!("Reusing stored vector for {}", record.title);
                    record.vector = stored.vector;
                    record.cover_url = stored.cover_url;
                    record.source_url = stored.source_url;
                    report.reused += 1;
                }
                _ => {
                    log::info!("Generating vibes for: {}...", record.title);
                    record.vector = self.embedder.embed(&record.description).await?;
                }
            }

            self.collection.upsert(&record).await?;
            report.seeded += 1;
        }

        log::info!("{}", report);
        Ok(report)
    }
}
