//! Error handling

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::scoring::ClassifierError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Malformed or missing input
    #[error("{0}")]
    ValidationError(String),

    // Resource errors
    #[error("{0}")]
    NotFound(String),

    // Classifier process or output errors
    #[error("Prediction failed: {0}")]
    PredictionFailure(String),

    // Database errors
    #[error("Storage error: {0}")]
    StorageError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::PredictionFailure(msg) => {
                tracing::error!("Prediction failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::StorageError(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error occurred".to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<ClassifierError> for AppError {
    fn from(err: ClassifierError) -> Self {
        AppError::PredictionFailure(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::ValidationError(err.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(err: PathRejection) -> Self {
        AppError::ValidationError(err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::ValidationError(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (AppError::ValidationError("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("missing".into()), StatusCode::NOT_FOUND),
            (AppError::PredictionFailure("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::StorageError("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn prediction_failure_keeps_diagnostic() {
        let err = AppError::from(ClassifierError::InvalidOutput("not json".into()));
        assert!(err.to_string().contains("not json"));
    }
}
