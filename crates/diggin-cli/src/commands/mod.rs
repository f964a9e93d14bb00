pub mod config;
pub mod run;
pub mod seed;

pub use run::{run_scheduler, run_sweep};
pub use seed::run_seed;

use std::sync::Arc;

use anyhow::{Context, Result};
use diggin_etl::{Config, Embedder, LastFmClient, OllamaEmbedder};
use diggin_search::{InMemoryCollection, QdrantCollection, VectorCollection};
use tokio_util::sync::CancellationToken;

/// Open the album collection named in `config`.
pub fn open_collection(config: &Config, memory: bool) -> Result<Arc<dyn VectorCollection>> {
    if memory {
        log::info!(
            "Using in-memory collection {}; nothing will be persisted",
            config.collection_name
        );
        return Ok(Arc::new(InMemoryCollection::new(
            config.collection_name.clone(),
            config.embedding_dimensions,
        )));
    }

    let collection = QdrantCollection::new(
        &config.qdrant_url,
        config.collection_name.clone(),
        config.embedding_dimensions,
        config.schedule.request_timeout(),
    )
    .context("Failed to create Qdrant client")?;
    Ok(Arc::new(collection))
}

pub fn open_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder = OllamaEmbedder::new(
        &config.ollama_url,
        config.embedding_model.clone(),
        config.embedding_dimensions,
        config.schedule.request_timeout(),
    )
    .context("Failed to create Ollama client")?;
    Ok(Arc::new(embedder))
}

/// Build the Last.fm client. Fails when no API key is configured.
pub fn open_source(config: &Config) -> Result<LastFmClient> {
    let api_key = config.require_lastfm_api_key()?;
    let client = LastFmClient::new(
        api_key,
        config.lastfm_base_url.clone(),
        config.schedule.request_timeout(),
    )
    .context("Failed to create Last.fm client")?
    .with_page_size(config.schedule.page_size);
    Ok(client)
}

/// A token that is cancelled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupted, finishing current step...");
                trigger.cancel();
            }
            Err(e) => log::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
    cancel
}
