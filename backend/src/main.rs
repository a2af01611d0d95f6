use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safebus_backend::{
    build_router,
    config::Config,
    db::connection::{create_pool, run_migrations},
    services::{ChatModel, GeminiClient},
    state::AppState,
    store::{DocumentStore, MemoryStore, PgStore},
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match url.split_once('@') {
        Some((_, host)) => format!("postgres://***@{host}"),
        None => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safebus_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url.as_deref().map(mask_database_url).unwrap_or_else(|| "<memory>".into()),
        jwt_secret = %mask_secret(&config.jwt_secret),
        time_zone = %config.time_zone,
        gemini_api_key = %mask_secret(config.gemini_api_key.as_deref().unwrap_or_default()),
        gemini_model = %config.gemini_model,
        lost_found_retention_hours = config.lost_found_retention_hours,
        "Loaded configuration from environment/.env"
    );

    let store: Arc<dyn DocumentStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; documents are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let chat_model: Option<Arc<dyn ChatModel>> = match GeminiClient::from_config(&config)? {
        Some(client) => Some(Arc::new(client)),
        None => {
            tracing::warn!("GEMINI_API_KEY not set; /chat will answer missing_api_key");
            None
        }
    };

    let port = config.server_port;
    let app = build_router(AppState::new(store, config, chat_model));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
