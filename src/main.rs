//! Difficulty calculation service entry point.

mod beatmap;
mod cache;
mod config;
mod database;
mod difficulty;
mod error;
mod request;
mod server;

use std::sync::Arc;

use crate::beatmap::BeatmapStore;
use crate::cache::DifficultyCache;
use crate::config::Settings;
use crate::database::Database;
use crate::difficulty::RulesetRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("MAIN: Booting diffcalc {}...", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    log::info!("MAIN: Database: {:?}", settings.database_path);
    log::info!("MAIN: Beatmap folder: {:?}", settings.beatmap_folder_path);

    let database = Database::new(&settings.database_path).await?;
    let beatmaps = BeatmapStore::new(
        settings.beatmap_folder_path.clone(),
        settings.beatmap_download_url.clone(),
    );

    let registry = RulesetRegistry::new();
    for (ruleset, name) in registry.calculators_with_names() {
        log::info!("MAIN: Registered {} calculator for {}", name, ruleset);
    }

    let cache = DifficultyCache::new(Arc::new(database), Arc::new(beatmaps), Arc::new(registry))
        .with_lookup_log_interval(settings.lookup_log_interval);

    server::serve(&settings.listen_addr, Arc::new(cache)).await?;
    Ok(())
}
