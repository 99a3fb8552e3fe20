//! Transactions handlers

use axum::{extract::{rejection::{PathRejection, QueryRejection}, State, Path, Query}, Json};

use crate::{AppState, AppResult, AppError};
use crate::models::{ListParams, Page, Transaction, TransactionQuery};

/// List transactions with filters, sorting and pagination
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<TransactionQuery>, QueryRejection>,
) -> AppResult<Json<Page<Transaction>>> {
    let Query(query) = query?;
    let params = ListParams::try_from(query)?;

    let page = Transaction::list(&state.pool, &params).await?;
    Ok(Json(page))
}

/// Get single transaction
pub async fn get(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Transaction>> {
    let Path(id) = id?;
    let transaction = Transaction::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(transaction))
}
