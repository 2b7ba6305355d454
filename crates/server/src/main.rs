//! `evently-server` entrypoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use event_store::EventStore;
use pipeline::Scorer;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use server::{AppState, Config, RecommendationOrchestrator, build_ranker, cors_layer, create_router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let addr = config.socket_addr();

    let store = Arc::new(
        EventStore::open(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?,
    );
    info!("Loaded {} events from {}", store.list_events().await.len(), store.path().display());

    let ranker = build_ranker(
        config.ml_url.as_deref(),
        config.ml_timeout,
        Scorer::new(config.recency_mode),
    )?;
    if config.ml_url.is_none() {
        warn!("ML_URL not set, recommendations use the local scorer only");
    }
    info!("Ranking with {} ranker (recency mode: {})", ranker.name(), config.recency_mode);

    let orchestrator = RecommendationOrchestrator::new(Arc::clone(&store), ranker);
    let state = AppState::new(store, orchestrator);
    let app = create_router(state, cors_layer(&config.client_origin)?);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("API listening on http://{}", addr);
    info!("CORS allowed: {}", config.client_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
