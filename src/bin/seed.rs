//! Bulk-load the labeled transaction CSV
//!
//! Configuration comes from the same environment as the server, plus
//! `CSV_PATH`, `SEED_BATCH_SIZE` and `SEED_RESET`.

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fraudlens_api::{config, db, ingest, process_classifier};
use fraudlens_api::scoring::ScoringBridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "fraudlens_api=info,seed=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(path = %config.csv_path.display(), batch_size = config.seed_batch_size, "Seeding transactions");

    let file = std::fs::File::open(&config.csv_path)
        .with_context(|| format!("Failed to open {}", config.csv_path.display()))?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to create database pool")?;

    if config.seed_reset {
        db::reset(&pool).await.context("Failed to reset schema")?;
    } else {
        db::run_migrations(&pool).await.context("Failed to apply schema")?;
    }

    let bridge = ScoringBridge::new(Arc::new(process_classifier(&config)));
    let report = ingest::ingest_csv(&pool, &bridge, std::io::BufReader::new(file), config.seed_batch_size)
        .await
        .context("Ingestion failed")?;

    tracing::info!(
        inserted = report.inserted,
        scored = report.scored,
        unscored = report.inserted - report.scored,
        skipped = report.rows_skipped,
        "Seed complete"
    );
    Ok(())
}
