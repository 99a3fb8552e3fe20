//! Live prediction handler

use axum::{extract::{rejection::JsonRejection, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{AppState, AppResult, AppError};
use crate::models::{NewTransaction, Transaction};
use crate::scoring::{FeatureVector, Prediction, RiskLevel, FEATURE_COUNT};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: Option<Vec<f64>>,
    #[serde(default)]
    pub time_elapsed: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub transaction_id: i64,
    pub prediction: i32,
    pub predicted_class: i32,
    pub is_fraud: bool,
    pub fraud_probability: f64,
    pub risk_level: RiskLevel,
    pub model: String,
}

impl PredictResponse {
    fn new(transaction_id: i64, p: Prediction) -> Self {
        Self {
            transaction_id,
            prediction: p.prediction,
            predicted_class: p.prediction,
            is_fraud: p.is_fraud,
            fraud_probability: p.fraud_probability,
            risk_level: p.risk_level,
            model: p.model,
        }
    }
}

fn features_hint() -> AppError {
    AppError::ValidationError(format!(
        "features must be an array of {FEATURE_COUNT} numbers (V1-V28 + Amount)"
    ))
}

/// Score one transaction and persist it with its verdict
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!("Rejected predict body: {}", e.body_text());
        features_hint()
    })?;

    let features = req.features.ok_or_else(features_hint)?;
    let features = FeatureVector::try_from(features)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let time_elapsed = match req.time_elapsed {
        Some(t) if !t.is_finite() || t < 0.0 => {
            return Err(AppError::ValidationError("time_elapsed must be a non-negative number".to_string()));
        }
        Some(t) => t,
        None => 0.0,
    };

    // Scoring happens before any write so a failure leaves nothing behind
    let prediction = state.bridge.score(&features).await?;

    let stored = Transaction::insert(&state.pool, NewTransaction {
        features,
        time_elapsed,
        actual_class: None,
        prediction: Some(prediction.clone()),
    }).await?;

    tracing::info!(
        transaction_id = stored.id,
        fraud_probability = prediction.fraud_probability,
        risk_level = %prediction.risk_level,
        model = %prediction.model,
        "Transaction scored"
    );

    Ok(Json(PredictResponse::new(stored.id, prediction)))
}
