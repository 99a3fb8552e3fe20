//! CSV export handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use std::str::FromStr;
use validator::Validate;

use crate::{AppState, AppResult, AppError};
use crate::models::transaction::empty_as_none;
use crate::models::{ExportRow, TransactionFilter};
use crate::scoring::RiskLevel;

pub const DEFAULT_EXPORT_LIMIT: i64 = 1000;

pub const EXPORT_HEADERS: [&str; 7] = [
    "ID", "Amount", "Time", "Actual Class", "Predicted Class", "Fraud Probability", "Risk Level",
];

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ExportQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, max = 100000, message = "limit must be between 1 and 100000"))]
    pub limit: Option<i64>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub risk_level: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 0, max = 1, message = "actual_class must be 0 or 1"))]
    pub actual_class: Option<i32>,
}

/// Render rows as CSV; null cells are left empty
pub fn render_csv(rows: &[ExportRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;

    let opt = |v: Option<String>| v.unwrap_or_default();
    for row in rows {
        writer.write_record([
            row.id.to_string(),
            row.amount.to_string(),
            row.time_elapsed.to_string(),
            opt(row.actual_class.map(|c| c.to_string())),
            opt(row.predicted_class.map(|c| c.to_string())),
            opt(row.fraud_probability.map(|p| p.to_string())),
            opt(row.risk_level.clone()),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Download transactions as a CSV attachment
pub async fn export_csv(
    State(state): State<AppState>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(query) = query?;
    query.validate()?;

    let risk_level = query
        .risk_level
        .as_deref()
        .map(RiskLevel::from_str)
        .transpose()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let filter = TransactionFilter {
        risk_level,
        actual_class: query.actual_class,
        ..Default::default()
    };
    let limit = query.limit.unwrap_or(DEFAULT_EXPORT_LIMIT);

    let rows = ExportRow::fetch(&state.pool, &filter, limit).await?;
    let body = render_csv(&rows).map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::info!(rows = rows.len(), "CSV export generated");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=fraudlens_export.csv"),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_header_and_empty_nulls() {
        let rows = vec![
            ExportRow {
                id: 1,
                amount: 149.62,
                time_elapsed: 0.0,
                actual_class: Some(0),
                predicted_class: Some(0),
                fraud_probability: Some(0.0123),
                risk_level: Some("LOW".to_string()),
            },
            ExportRow {
                id: 2,
                amount: 2.69,
                time_elapsed: 3600.0,
                actual_class: None,
                predicted_class: None,
                fraud_probability: None,
                risk_level: None,
            },
        ];

        let csv = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "ID,Amount,Time,Actual Class,Predicted Class,Fraud Probability,Risk Level");
        assert_eq!(lines[1], "1,149.62,0,0,0,0.0123,LOW");
        assert_eq!(lines[2], "2,2.69,3600,,,,");
        assert_eq!(lines.len(), 3);
    }
}
