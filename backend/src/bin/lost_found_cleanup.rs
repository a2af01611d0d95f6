use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safebus_backend::{
    config::Config,
    db::connection::create_pool,
    services::LostFoundService,
    store::PgStore,
    utils::time::now_ms,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safebus_backend=info,lost_found_cleanup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to purge lost & found items")?;
    let pool = create_pool(database_url).await?;

    let service = LostFoundService::new(
        Arc::new(PgStore::new(pool.clone())),
        config.lost_found_retention_ms(),
    );
    let deleted = service
        .purge_expired(now_ms())
        .await
        .context("purge expired lost & found items")?;
    tracing::info!("Deleted {} expired lost & found items", deleted);

    sqlx::query("VACUUM (ANALYZE) documents")
        .execute(&pool)
        .await
        .context("vacuum documents table")?;

    Ok(())
}
