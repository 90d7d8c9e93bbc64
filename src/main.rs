use anyhow::Context;
use tracing_subscriber::EnvFilter;

use leadboard::config::config;
use leadboard::database::models::SyncRun;
use leadboard::database::DatabaseManager;
use leadboard::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    config.validate()?;
    tracing::info!("Starting Leadboard API in {:?} mode", config.environment);

    let db = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to database")?;
    let abandoned = SyncRun::abandon_stale(db.pool()).await?;
    if abandoned > 0 {
        tracing::warn!("Marked {} interrupted sync runs as failed", abandoned);
    }

    let state = AppState::from_config(config.clone(), db.clone())?;

    if config.sync.enabled {
        state.sync.clone().spawn();
    } else {
        tracing::info!("Delta sync service disabled");
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Leadboard API listening on http://{}", bind_addr);

    axum::serve(listener, leadboard::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
