//! FraudLens API
//!
//! Scores card transactions through an external classifier, stores the
//! verdicts and serves the reporting views of the fraud dashboard.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        FRAUDLENS API                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────────┐   ┌──────────────────┐   │
//! │  │  API      │──▶│ Scoring Bridge │──▶│ Classifier       │   │
//! │  │  (Axum)   │   │ (tier policy)  │   │ (subprocess)     │   │
//! │  └─────┬─────┘   └───────┬────────┘   └──────────────────┘   │
//! │        │ reports         │ scored rows                       │
//! │        ▼                 ▼                                   │
//! │  ┌──────────────────────────────┐   ┌──────────────────┐     │
//! │  │         PostgreSQL           │◀──│ Seed (bulk CSV)  │     │
//! │  └──────────────────────────────┘   └──────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod scoring;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};

use models::ArtifactPaths;
use scoring::{Classifier, ProcessClassifier, RetryPolicy, ScoringBridge};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub bridge: ScoringBridge,
    pub artifacts: ArtifactPaths,
}

impl AppState {
    /// State backed by the configured classifier script
    pub fn new(pool: sqlx::PgPool, config: config::Config) -> Self {
        let classifier = process_classifier(&config);
        Self::with_classifier(pool, config, Arc::new(classifier))
    }

    pub fn with_classifier(
        pool: sqlx::PgPool,
        config: config::Config,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let artifacts = ArtifactPaths::new(&config.model_dir, &config.spark_dir);
        Self {
            pool,
            bridge: ScoringBridge::new(classifier),
            artifacts,
            config,
        }
    }
}

/// `python3 predict.py` with the configured timeout and retry bounds
pub fn process_classifier(config: &config::Config) -> ProcessClassifier {
    ProcessClassifier::python(&config.python_path, config.predict_script(), config.model_dir.clone())
        .with_timeout(config.predict_timeout)
        .with_retry(RetryPolicy {
            max_retries: config.predict_max_retries,
            ..RetryPolicy::default()
        })
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let stats_routes = Router::new()
        .route("/", get(handlers::stats::summary))
        .route("/overview", get(handlers::stats::overview))
        .route("/hourly", get(handlers::stats::hourly))
        .route("/amount-distribution", get(handlers::stats::amount_distribution))
        .route("/risk-distribution", get(handlers::stats::risk_distribution))
        .route("/class-distribution", get(handlers::stats::class_distribution))
        .route("/confusion-matrix", get(handlers::stats::confusion_matrix))
        .route("/time-series", get(handlers::stats::time_series))
        .route("/top-fraud", get(handlers::stats::top_fraud))
        .route("/prediction-accuracy", get(handlers::stats::prediction_accuracy))
        .route("/amount-by-risk", get(handlers::stats::amount_by_risk))
        .route("/realtime-summary", get(handlers::stats::realtime_summary))

        // Training artifacts
        .route("/model-info", get(handlers::stats::model_info))
        .route("/model-comparison", get(handlers::stats::model_comparison))
        .route("/feature-importance", get(handlers::stats::feature_importance))

        .route("/export/csv", get(handlers::export::export_csv));

    let api_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/transactions", get(handlers::transactions::list))
        .route("/transactions/:id", get(handlers::transactions::get))
        .nest("/stats", stats_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any)
                ),
        )
        .with_state(state)
}
