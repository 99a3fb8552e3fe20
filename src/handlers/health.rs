//! Health check handler

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: i64,
}

pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "fraudlens-api",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
