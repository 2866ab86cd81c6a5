use anyhow::Result;
use tracing::info;
use visitslovenia::api::ApiServer;
use visitslovenia::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    visitslovenia::tracing::init_tracing("info,sqlx=warn")?;

    env_util::preflight_check(
        "api_server",
        &["API_SECRET"],
        &[
            "API_HOST",
            "API_PORT",
            "DATABASE_URL",
            "INVENTORY_API_URL",
            "INVENTORY_API_KEY",
            "CDN_STORAGE_ZONE",
            "CDN_PULL_ZONE",
            "POPULATION_API_URL",
        ],
    )?;

    let ctx = visitslovenia::build_context().await?;
    info!(
        cdn = ctx.cdn.is_some(),
        population_lookup = ctx.population.is_some(),
        "import context ready"
    );

    let server = ApiServer::from_env()?;
    server.run(ctx).await
}
