//! FraudLens API server

use anyhow::Context;
use std::net::SocketAddr;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fraudlens_api::{config, create_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    init_tracing(config.is_production());

    tracing::info!("FraudLens API starting...");
    tracing::info!("Database: {}", config.redacted_database_url());
    tracing::info!(
        classifier = %config.predict_script().display(),
        timeout_secs = config.predict_timeout.as_secs(),
        "Classifier configured"
    );

    // Initialize database pool
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Applying database schema...");
    db::run_migrations(&pool)
        .await
        .context("Failed to apply schema")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_router(AppState::new(pool, config));

    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fraudlens_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
}
