// Merit Regime - API Server
// Serves the index engine, regime playbooks and candidate matching over HTTP

use anyhow::{Context, Result};
use tracing::info;

use merit_regime::api::{router, AppState};
use merit_regime::logging::init_tracing;
use merit_regime::{Settings, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log_level);

    info!("🌐 Merit Regime API v{}", merit_regime::VERSION);

    let store = Store::open(&settings.database_path)
        .with_context(|| format!("Failed to open database at {}", settings.database_path))?;
    info!(path = %settings.database_path, "✓ database opened");

    let addr = settings.socket_addr()?;
    let state = AppState::with_store(settings, store)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
    }
}
