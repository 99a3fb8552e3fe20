//! Reporting handlers

use axum::{extract::State, Json};
use serde_json::Value;

use crate::{AppState, AppResult, AppError};
use crate::models::artifacts::{self, ModelInfo};
use crate::models::stats::{
    self, AmountBucket, AmountByRisk, ClassBucket, ConfusionMatrix, HourlyPoint, Overview,
    PredictionAccuracy, RealtimeSummary, RiskBucket, Summary, TimeSeriesPoint, TopRiskTransaction,
};

/// Dashboard headline numbers
pub async fn summary(State(state): State<AppState>) -> AppResult<Json<Summary>> {
    Ok(Json(stats::summary(&state.pool).await?))
}

pub async fn overview(State(state): State<AppState>) -> AppResult<Json<Overview>> {
    Ok(Json(stats::overview(&state.pool).await?))
}

pub async fn hourly(State(state): State<AppState>) -> AppResult<Json<Vec<HourlyPoint>>> {
    Ok(Json(stats::hourly(&state.pool).await?))
}

pub async fn amount_distribution(State(state): State<AppState>) -> AppResult<Json<Vec<AmountBucket>>> {
    Ok(Json(stats::amount_distribution(&state.pool).await?))
}

pub async fn risk_distribution(State(state): State<AppState>) -> AppResult<Json<Vec<RiskBucket>>> {
    Ok(Json(stats::risk_distribution(&state.pool).await?))
}

pub async fn class_distribution(State(state): State<AppState>) -> AppResult<Json<Vec<ClassBucket>>> {
    Ok(Json(stats::class_distribution(&state.pool).await?))
}

pub async fn confusion_matrix(State(state): State<AppState>) -> AppResult<Json<ConfusionMatrix>> {
    Ok(Json(stats::confusion_matrix(&state.pool).await?))
}

pub async fn time_series(State(state): State<AppState>) -> AppResult<Json<Vec<TimeSeriesPoint>>> {
    Ok(Json(stats::time_series(&state.pool).await?))
}

pub async fn top_fraud(State(state): State<AppState>) -> AppResult<Json<Vec<TopRiskTransaction>>> {
    Ok(Json(stats::top_risk(&state.pool).await?))
}

pub async fn prediction_accuracy(State(state): State<AppState>) -> AppResult<Json<PredictionAccuracy>> {
    Ok(Json(stats::prediction_accuracy(&state.pool).await?))
}

pub async fn amount_by_risk(State(state): State<AppState>) -> AppResult<Json<Vec<AmountByRisk>>> {
    Ok(Json(stats::amount_by_risk(&state.pool).await?))
}

pub async fn realtime_summary(State(state): State<AppState>) -> AppResult<Json<RealtimeSummary>> {
    Ok(Json(stats::realtime_summary(&state.pool).await?))
}

/// Model metadata plus comparison and feature importance when available
pub async fn model_info(State(state): State<AppState>) -> AppResult<Json<ModelInfo>> {
    let info = artifacts::model_info(&state.artifacts)
        .await?
        .ok_or_else(|| AppError::NotFound("Model metadata not found".to_string()))?;

    Ok(Json(info))
}

pub async fn model_comparison(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(artifacts::model_comparison(&state.artifacts).await?))
}

pub async fn feature_importance(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    Ok(Json(artifacts::feature_importance(&state.artifacts).await?))
}
