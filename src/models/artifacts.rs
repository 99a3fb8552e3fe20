//! Training pipeline artifacts
//!
//! JSON documents written by the training job. They are read on every
//! request and passed through with light reshaping.

use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Locations of the artifact files
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model_meta: PathBuf,
    pub model_comparison: PathBuf,
    pub feature_importance: PathBuf,
}

impl ArtifactPaths {
    pub fn new(model_dir: &Path, spark_dir: &Path) -> Self {
        let output = spark_dir.join("output").join("model");
        Self {
            model_meta: model_dir.join("model_meta.json"),
            model_comparison: output.join("model_comparison.json"),
            feature_importance: output.join("feature_importance.json"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
}

impl From<ArtifactError> for crate::AppError {
    fn from(err: ArtifactError) -> Self {
        crate::AppError::InternalError(err.to_string())
    }
}

/// Read a JSON document; `None` when the file does not exist.
pub async fn read_json(path: &Path) -> Result<Option<Value>, ArtifactError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ArtifactError::Io { path: path.display().to_string(), source });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ArtifactError::Parse { path: path.display().to_string(), source })
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub meta: Value,
    pub comparison: Option<Value>,
    #[serde(rename = "featureImportance")]
    pub feature_importance: Option<Value>,
}

/// `None` when the model metadata file is missing
pub async fn model_info(paths: &ArtifactPaths) -> Result<Option<ModelInfo>, ArtifactError> {
    let Some(meta) = read_json(&paths.model_meta).await? else {
        return Ok(None);
    };

    Ok(Some(ModelInfo {
        meta,
        comparison: read_json(&paths.model_comparison).await?,
        feature_importance: read_json(&paths.feature_importance).await?,
    }))
}

/// Accepts `{"models": [...]}` or a bare array
pub fn comparison_models(document: Value) -> Vec<Value> {
    match document {
        Value::Array(models) => models,
        Value::Object(mut map) => match map.remove("models") {
            Some(Value::Array(models)) => models,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub async fn model_comparison(paths: &ArtifactPaths) -> Result<Vec<Value>, ArtifactError> {
    Ok(read_json(&paths.model_comparison)
        .await?
        .map(comparison_models)
        .unwrap_or_default())
}

/// `[feature, value]` pairs become `{feature, importance}`; objects pass through
pub fn importance_entries(document: Value) -> Vec<Value> {
    let Value::Array(items) = document else {
        return Vec::new();
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Array(pair) if pair.len() >= 2 => {
                let mut pair = pair.into_iter();
                let feature = pair.next().unwrap_or(Value::Null);
                let importance = pair.next().unwrap_or(Value::Null);
                serde_json::json!({ "feature": feature, "importance": importance })
            }
            other => other,
        })
        .collect()
}

pub async fn feature_importance(paths: &ArtifactPaths) -> Result<Vec<Value>, ArtifactError> {
    Ok(read_json(&paths.feature_importance)
        .await?
        .map(importance_entries)
        .unwrap_or_default())
}
