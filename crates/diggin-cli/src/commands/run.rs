use std::sync::Arc;

use anyhow::Result;
use diggin_etl::{Config, IngestScheduler, SchedulerSettings};

use super::{cancel_on_ctrl_c, open_collection, open_embedder, open_source};

fn build_scheduler(config: &Config, memory: bool) -> Result<IngestScheduler> {
    let source = open_source(config)?;
    let embedder = open_embedder(config)?;
    let collection = open_collection(config, memory)?;
    let settings = SchedulerSettings::from_config(config);

    log::info!(
        "Sweeping {} tags into collection {} with {}",
        settings.tags.len(),
        collection.name(),
        config.embedding_model
    );

    Ok(IngestScheduler::new(
        Arc::new(source),
        embedder,
        collection,
        settings,
        cancel_on_ctrl_c(),
    ))
}

/// Run the scheduler until Ctrl-C.
pub async fn run_scheduler(config: &Config, memory: bool) -> Result<()> {
    let scheduler = Arc::new(build_scheduler(config, memory)?);
    let completed = scheduler.run().await;
    println!("\n✓ Stopped after {completed} completed sweeps");
    Ok(())
}

/// Run exactly one sweep and print the report.
pub async fn run_sweep(config: &Config, memory: bool) -> Result<()> {
    let scheduler = build_scheduler(config, memory)?;
    let report = scheduler.sweep().await?;
    println!("\n✓ Sweep complete: {report}");
    Ok(())
}
