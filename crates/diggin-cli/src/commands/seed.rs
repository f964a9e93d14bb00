use anyhow::Result;
use diggin_etl::{starter_pack, Config, SeedLoader};

use super::{open_collection, open_embedder};

pub async fn run_seed(config: &Config, memory: bool) -> Result<()> {
    let loader = SeedLoader::new(open_embedder(config)?, open_collection(config, memory)?);
    let report = loader.seed(starter_pack()).await?;

    println!("{report}");
    if report.reused > 0 {
        println!("  ({} already up to date)", report.reused);
    }
    Ok(())
}
