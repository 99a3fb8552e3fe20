//! Transaction model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::str::FromStr;
use validator::Validate;

use crate::scoring::{FeatureVector, Prediction, RiskLevel};

pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
    pub v4: f64,
    pub v5: f64,
    pub v6: f64,
    pub v7: f64,
    pub v8: f64,
    pub v9: f64,
    pub v10: f64,
    pub v11: f64,
    pub v12: f64,
    pub v13: f64,
    pub v14: f64,
    pub v15: f64,
    pub v16: f64,
    pub v17: f64,
    pub v18: f64,
    pub v19: f64,
    pub v20: f64,
    pub v21: f64,
    pub v22: f64,
    pub v23: f64,
    pub v24: f64,
    pub v25: f64,
    pub v26: f64,
    pub v27: f64,
    pub v28: f64,
    pub amount: f64,
    pub time_elapsed: f64,
    pub actual_class: Option<i32>,
    pub predicted_class: Option<i32>,
    pub fraud_probability: Option<f64>,
    pub risk_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A record ready to insert. Derived fields stay null when unscored.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub features: FeatureVector,
    pub time_elapsed: f64,
    pub actual_class: Option<i32>,
    pub prediction: Option<Prediction>,
}

/// Sortable columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Amount,
    FraudProbability,
    Id,
}

impl SortField {
    /// Unknown names fall back to `created_at`
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("amount") => SortField::Amount,
            Some("fraud_probability") => SortField::FraudProbability,
            Some("id") => SortField::Id,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Amount => "amount",
            SortField::FraudProbability => "fraud_probability",
            SortField::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than ASC sorts descending
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Raw query string of `GET /api/transactions`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct TransactionQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, message = "page must be >= 1"))]
    pub page: Option<i64>,

    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: Option<i64>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub risk_level: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub min_amount: Option<f64>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub max_amount: Option<f64>,

    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(range(min = 0, max = 1, message = "actual_class must be 0 or 1"))]
    pub actual_class: Option<i32>,

    #[serde(default)]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub sort_order: Option<String>,
}

/// Typed row filter shared by listing and export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub risk_level: Option<RiskLevel>,
    pub actual_class: Option<i32>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: i64,
    pub limit: i64,
    pub filter: TransactionFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl ListParams {
    /// Rows to skip; saturates for pages beyond any possible table
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl TryFrom<TransactionQuery> for ListParams {
    type Error = crate::AppError;

    fn try_from(query: TransactionQuery) -> Result<Self, Self::Error> {
        query.validate()?;

        let risk_level = query
            .risk_level
            .as_deref()
            .map(RiskLevel::from_str)
            .transpose()
            .map_err(|e| crate::AppError::ValidationError(e.to_string()))?;

        for (name, bound) in [("min_amount", query.min_amount), ("max_amount", query.max_amount)] {
            if bound.is_some_and(|v| !v.is_finite()) {
                return Err(crate::AppError::ValidationError(format!("{name} must be a finite number")));
            }
        }

        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if (page - 1).checked_mul(limit).is_none() {
            return Err(crate::AppError::ValidationError("page is out of range".to_string()));
        }

        Ok(Self {
            page,
            limit,
            filter: TransactionFilter {
                risk_level,
                actual_class: query.actual_class,
                min_amount: query.min_amount,
                max_amount: query.max_amount,
            },
            sort_by: SortField::from_param(query.sort_by.as_deref()),
            sort_order: SortOrder::from_param(query.sort_order.as_deref()),
        })
    }
}

/// One page of results plus totals computed without pagination
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// Columns written on insert, in bind order
const INSERT_COLUMNS: &str = "INSERT INTO transactions (\
    v1, v2, v3, v4, v5, v6, v7, v8, v9, v10, \
    v11, v12, v13, v14, v15, v16, v17, v18, v19, v20, \
    v21, v22, v23, v24, v25, v26, v27, v28, \
    amount, time_elapsed, actual_class, predicted_class, fraud_probability, risk_level) ";

fn insert_builder<'a>(rows: &'a [NewTransaction]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(INSERT_COLUMNS);
    builder.push_values(rows, |mut b, row| {
        for value in row.features.pca() {
            b.push_bind(*value);
        }
        let prediction = row.prediction.as_ref();
        b.push_bind(row.features.amount())
            .push_bind(row.time_elapsed)
            .push_bind(row.actual_class)
            .push_bind(prediction.map(|p| p.prediction))
            .push_bind(prediction.map(|p| p.fraud_probability))
            .push_bind(prediction.map(|p| p.risk_level.as_str()));
    });
    builder
}

pub(crate) fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    let mut prefix = " WHERE ";

    if let Some(level) = filter.risk_level {
        builder.push(prefix).push("risk_level = ").push_bind(level.as_str());
        prefix = " AND ";
    }
    if let Some(min) = filter.min_amount {
        builder.push(prefix).push("amount >= ").push_bind(min);
        prefix = " AND ";
    }
    if let Some(max) = filter.max_amount {
        builder.push(prefix).push("amount <= ").push_bind(max);
        prefix = " AND ";
    }
    if let Some(class) = filter.actual_class {
        builder.push(prefix).push("actual_class = ").push_bind(class);
    }
}

pub(crate) fn list_query(params: &ListParams) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions");
    push_filters(&mut builder, &params.filter);

    let order = params.sort_order.keyword();
    builder.push(format!(" ORDER BY {} {}", params.sort_by.column(), order));
    if params.sort_by != SortField::Id {
        // Bulk inserts share created_at; keep pages stable
        builder.push(format!(", id {order}"));
    }

    builder
        .push(" LIMIT ")
        .push_bind(params.limit)
        .push(" OFFSET ")
        .push_bind(params.offset());
    builder
}

impl Transaction {
    /// Insert one record, returning it with its generated id
    pub async fn insert(pool: &PgPool, data: NewTransaction) -> Result<Self, sqlx::Error> {
        let rows = [data];
        let mut builder = insert_builder(&rows);
        builder.push(" RETURNING *");

        builder
            .build_query_as::<Transaction>()
            .fetch_one(pool)
            .await
    }

    /// Insert a chunk in a single statement
    pub async fn insert_many(pool: &PgPool, rows: &[NewTransaction]) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let result = insert_builder(rows).build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count(pool: &PgPool, filter: &TransactionFilter) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM transactions");
        push_filters(&mut builder, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &PgPool, params: &ListParams) -> Result<Page<Self>, sqlx::Error> {
        let total = Self::count(pool, &params.filter).await?;

        let data = list_query(params)
            .build_query_as::<Transaction>()
            .fetch_all(pool)
            .await?;

        Ok(Page {
            data,
            total,
            page: params.page,
            limit: params.limit,
            total_pages: total_pages(total, params.limit),
        })
    }
}

/// Columns of the CSV export
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ExportRow {
    pub id: i64,
    pub amount: f64,
    pub time_elapsed: f64,
    pub actual_class: Option<i32>,
    pub predicted_class: Option<i32>,
    pub fraud_probability: Option<f64>,
    pub risk_level: Option<String>,
}

impl ExportRow {
    pub async fn fetch(
        pool: &PgPool,
        filter: &TransactionFilter,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::new(
            "SELECT id, amount, time_elapsed, actual_class, predicted_class, fraud_probability, risk_level \
             FROM transactions",
        );
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY id LIMIT ").push_bind(limit);

        builder
            .build_query_as::<ExportRow>()
            .fetch_all(pool)
            .await
    }
}

/// Treats `?field=` like an absent parameter
pub(crate) fn empty_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(sort_by: Option<&str>, sort_order: Option<&str>) -> ListParams {
        ListParams::try_from(TransactionQuery {
            sort_by: sort_by.map(String::from),
            sort_order: sort_order.map(String::from),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn defaults_match_dashboard() {
        let p = params(None, None);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(p.sort_by, SortField::CreatedAt);
        assert_eq!(p.sort_order, SortOrder::Desc);
    }

    #[test]
    fn unknown_sort_field_falls_back() {
        let p = params(Some("malicious_field; DROP TABLE transactions"), Some("sideways"));
        assert_eq!(p.sort_by, SortField::CreatedAt);
        assert_eq!(p.sort_order, SortOrder::Desc);

        let sql = list_query(&p).into_sql();
        assert!(sql.contains("ORDER BY created_at DESC, id DESC"));
        assert!(!sql.contains("malicious"));
    }

    #[test]
    fn allow_listed_sorts() {
        let p = params(Some("fraud_probability"), Some("asc"));
        assert_eq!(p.sort_by, SortField::FraudProbability);
        assert_eq!(p.sort_order, SortOrder::Asc);

        let p = params(Some("id"), Some("ASC"));
        assert!(list_query(&p).into_sql().contains("ORDER BY id ASC LIMIT"));
    }

    #[test]
    fn filters_are_bound_not_interpolated() {
        let p = ListParams::try_from(TransactionQuery {
            risk_level: Some("high".to_string()),
            min_amount: Some(10.0),
            actual_class: Some(1),
            ..Default::default()
        })
        .unwrap();

        let sql = list_query(&p).into_sql();
        assert!(sql.contains("WHERE risk_level = $1 AND amount >= $2 AND actual_class = $3"));
        assert!(sql.contains("LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn invalid_filters_rejected() {
        let bad_level = TransactionQuery {
            risk_level: Some("EXTREME".to_string()),
            ..Default::default()
        };
        assert!(ListParams::try_from(bad_level).is_err());

        let bad_page = TransactionQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(ListParams::try_from(bad_page).is_err());

        let bad_class = TransactionQuery {
            actual_class: Some(2),
            ..Default::default()
        };
        assert!(ListParams::try_from(bad_class).is_err());
    }

    #[test]
    fn huge_page_is_rejected() {
        let query: TransactionQuery =
            serde_json::from_value(serde_json::json!({ "page": "9223372036854775807" })).unwrap();
        assert!(matches!(
            ListParams::try_from(query),
            Err(crate::AppError::ValidationError(_))
        ));

        // Largest page whose offset still fits
        let last = TransactionQuery {
            page: Some(i64::MAX / DEFAULT_PAGE_SIZE),
            ..Default::default()
        };
        let p = ListParams::try_from(last).unwrap();
        assert!(p.offset() > 0);
    }

    #[test]
    fn non_finite_amount_bounds_rejected() {
        for (min, max) in [(Some(f64::NAN), None), (None, Some(f64::INFINITY)), (Some(f64::NEG_INFINITY), None)] {
            let query = TransactionQuery {
                min_amount: min,
                max_amount: max,
                ..Default::default()
            };
            assert!(matches!(
                ListParams::try_from(query),
                Err(crate::AppError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn pagination_math() {
        assert_eq!(total_pages(45, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
        assert_eq!(total_pages(0, 20), 0);

        let p = ListParams {
            page: 3,
            limit: 20,
            filter: TransactionFilter::default(),
            sort_by: SortField::Id,
            sort_order: SortOrder::Asc,
        };
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn empty_query_values_are_ignored() {
        let query: TransactionQuery =
            serde_json::from_value(serde_json::json!({ "min_amount": "", "page": "2" })).unwrap();
        assert_eq!(query.min_amount, None);
        assert_eq!(query.page, Some(2));
    }
}
