pub mod api;
pub mod catalog;
pub mod import;
pub mod media;
pub mod store;
pub mod tracing;

pub mod util {
    pub mod db;
    pub mod env;
}

use anyhow::Result;

use catalog::population::PopulationClient;
use catalog::InventoryClient;
use import::pipeline::ImportContext;
use media::CdnStorage;
use util::db::Db;
use util::env::{env_opt, env_parse};

/// Build the shared context (database pool, inventory client, optional CDN
/// and population clients) from environment configuration. CDN and
/// population lookup are optional: without them imports still run, storing
/// provider image URLs and NULL populations. Callers log what ended up
/// configured.
pub async fn build_context() -> Result<ImportContext> {
    util::env::init_env();

    let database_url = util::env::db_url()?;
    let max_conns: u32 = env_parse("DB_MAX_CONNS", 10);
    let db = Db::connect(&database_url, max_conns).await?;

    let inventory = InventoryClient::new(
        env_opt("INVENTORY_API_URL").as_deref(),
        Some(env_parse("INVENTORY_API_TIMEOUT_SECS", 15u64)),
    )?
    .with_api_key(env_opt("INVENTORY_API_KEY"));

    let cdn = CdnStorage::from_env().ok();
    let population = PopulationClient::new(
        env_opt("POPULATION_API_URL").as_deref(),
        Some(env_parse("POPULATION_API_TIMEOUT_SECS", 10u64)),
    )
    .ok()
    .map(|client| client.with_api_key(env_opt("POPULATION_API_KEY")));

    Ok(ImportContext {
        db,
        inventory,
        cdn,
        population,
    })
}
