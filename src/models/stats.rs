//! Read-side aggregations over stored transactions
//!
//! Every query here is a single set-based read. Empty tables produce zero
//! counts and zero rates; averages over no rows are reported as 0.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Trailing window of the realtime summary
const RECENT_WINDOW: &str = "1 hour";

/// Hours reported by the hourly view
pub const HOURLY_WINDOW: i64 = 24;

/// Hours reported by the time series
pub const TIME_SERIES_WINDOW: i64 = 48;

/// Rows in the top-risk list
pub const TOP_RISK_LIMIT: i64 = 10;

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `part / whole`, or 0 for an empty whole
pub fn ratio(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, FromRow)]
pub struct SummaryCounts {
    pub total_transactions: i64,
    pub total_fraud: i64,
    pub avg_amount: f64,
    pub total_amount: f64,
    pub high_risk_count: i64,
    pub medium_risk_count: i64,
    pub low_risk_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_transactions: i64,
    pub total_fraud: i64,
    pub fraud_rate: f64,
    pub avg_amount: f64,
    pub total_amount: f64,
    pub high_risk_count: i64,
    pub medium_risk_count: i64,
    pub low_risk_count: i64,
}

impl From<SummaryCounts> for Summary {
    fn from(c: SummaryCounts) -> Self {
        Self {
            total_transactions: c.total_transactions,
            total_fraud: c.total_fraud,
            fraud_rate: round_to(ratio(c.total_fraud, c.total_transactions), 6),
            avg_amount: round_to(c.avg_amount, 2),
            total_amount: round_to(c.total_amount, 2),
            high_risk_count: c.high_risk_count,
            medium_risk_count: c.medium_risk_count,
            low_risk_count: c.low_risk_count,
        }
    }
}

pub async fn summary(pool: &PgPool) -> Result<Summary, sqlx::Error> {
    let counts = sqlx::query_as::<_, SummaryCounts>(
        r#"
        SELECT
            COUNT(*) AS total_transactions,
            COUNT(*) FILTER (WHERE actual_class = 1) AS total_fraud,
            COALESCE(AVG(amount), 0)::float8 AS avg_amount,
            COALESCE(SUM(amount), 0)::float8 AS total_amount,
            COUNT(*) FILTER (WHERE risk_level = 'HIGH') AS high_risk_count,
            COUNT(*) FILTER (WHERE risk_level = 'MEDIUM') AS medium_risk_count,
            COUNT(*) FILTER (WHERE risk_level = 'LOW') AS low_risk_count
        FROM transactions
        "#
    )
    .fetch_one(pool)
    .await?;

    Ok(counts.into())
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct OverviewCounts {
    pub total_transactions: i64,
    pub total_fraud: i64,
    pub total_non_fraud: i64,
    pub avg_amount: f64,
    pub avg_fraud_amount: f64,
    pub avg_non_fraud_amount: f64,
    pub high_risk_count: i64,
    pub medium_risk_count: i64,
    pub low_risk_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_transactions: i64,
    pub total_fraud: i64,
    pub total_non_fraud: i64,
    pub avg_amount: f64,
    pub avg_fraud_amount: f64,
    pub avg_non_fraud_amount: f64,
    /// Percentage, 4 decimals
    pub fraud_rate: f64,
    pub high_risk_count: i64,
    pub medium_risk_count: i64,
    pub low_risk_count: i64,
}

impl From<OverviewCounts> for Overview {
    fn from(c: OverviewCounts) -> Self {
        Self {
            total_transactions: c.total_transactions,
            total_fraud: c.total_fraud,
            total_non_fraud: c.total_non_fraud,
            avg_amount: round_to(c.avg_amount, 2),
            avg_fraud_amount: round_to(c.avg_fraud_amount, 2),
            avg_non_fraud_amount: round_to(c.avg_non_fraud_amount, 2),
            fraud_rate: round_to(ratio(c.total_fraud, c.total_transactions) * 100.0, 4),
            high_risk_count: c.high_risk_count,
            medium_risk_count: c.medium_risk_count,
            low_risk_count: c.low_risk_count,
        }
    }
}

pub async fn overview(pool: &PgPool) -> Result<Overview, sqlx::Error> {
    let counts = sqlx::query_as::<_, OverviewCounts>(
        r#"
        SELECT
            COUNT(*) AS total_transactions,
            COUNT(*) FILTER (WHERE actual_class = 1) AS total_fraud,
            COUNT(*) FILTER (WHERE actual_class = 0) AS total_non_fraud,
            COALESCE(AVG(amount), 0)::float8 AS avg_amount,
            COALESCE(AVG(amount) FILTER (WHERE actual_class = 1), 0)::float8 AS avg_fraud_amount,
            COALESCE(AVG(amount) FILTER (WHERE actual_class = 0), 0)::float8 AS avg_non_fraud_amount,
            COUNT(*) FILTER (WHERE risk_level = 'HIGH') AS high_risk_count,
            COUNT(*) FILTER (WHERE risk_level = 'MEDIUM') AS medium_risk_count,
            COUNT(*) FILTER (WHERE risk_level = 'LOW') AS low_risk_count
        FROM transactions
        "#
    )
    .fetch_one(pool)
    .await?;

    Ok(counts.into())
}

// ============================================================================
// DISTRIBUTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AmountBucket {
    #[serde(rename = "range")]
    pub bucket: String,
    pub total: i64,
    pub fraud_count: i64,
}

/// Buckets [0,10) [10,50) [50,100) [100,500) [500,1000) [1000,∞), lowest first
pub async fn amount_distribution(pool: &PgPool) -> Result<Vec<AmountBucket>, sqlx::Error> {
    sqlx::query_as::<_, AmountBucket>(
        r#"
        SELECT
            CASE
                WHEN amount < 10 THEN '0-10'
                WHEN amount < 50 THEN '10-50'
                WHEN amount < 100 THEN '50-100'
                WHEN amount < 500 THEN '100-500'
                WHEN amount < 1000 THEN '500-1000'
                ELSE '1000+'
            END AS bucket,
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE actual_class = 1) AS fraud_count
        FROM transactions
        GROUP BY 1
        ORDER BY MIN(amount)
        "#
    )
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RiskBucket {
    pub risk_level: String,
    pub count: i64,
}

/// Orders rows HIGH, MEDIUM, LOW
const RISK_ORDER_SQL: &str = "CASE risk_level WHEN 'HIGH' THEN 1 WHEN 'MEDIUM' THEN 2 WHEN 'LOW' THEN 3 END";

pub async fn risk_distribution(pool: &PgPool) -> Result<Vec<RiskBucket>, sqlx::Error> {
    let sql = format!(
        "SELECT risk_level, COUNT(*) AS count FROM transactions \
         WHERE risk_level IS NOT NULL GROUP BY risk_level ORDER BY {RISK_ORDER_SQL}"
    );

    sqlx::query_as::<_, RiskBucket>(&sql)
        .fetch_all(pool)
        .await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassBucket {
    pub name: &'static str,
    pub value: i64,
}

pub fn class_label(actual_class: i32) -> &'static str {
    if actual_class == 1 {
        "Fraudulent"
    } else {
        "Legitimate"
    }
}

pub async fn class_distribution(pool: &PgPool) -> Result<Vec<ClassBucket>, sqlx::Error> {
    let rows: Vec<(i32, i64)> = sqlx::query_as(
        r#"
        SELECT actual_class, COUNT(*) AS count
        FROM transactions
        WHERE actual_class IS NOT NULL
        GROUP BY actual_class
        ORDER BY actual_class
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(class, count)| ClassBucket { name: class_label(class), value: count })
        .collect())
}

// ============================================================================
// TIME
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct HourRow {
    pub hour: i64,
    pub total_count: i64,
    pub fraud_count: i64,
    pub avg_amount: f64,
    pub total_amount: f64,
}

async fn hour_rows(pool: &PgPool, window: i64) -> Result<Vec<HourRow>, sqlx::Error> {
    sqlx::query_as::<_, HourRow>(
        r#"
        SELECT
            FLOOR(time_elapsed / 3600)::bigint AS hour,
            COUNT(*) AS total_count,
            COUNT(*) FILTER (WHERE actual_class = 1) AS fraud_count,
            COALESCE(AVG(amount), 0)::float8 AS avg_amount,
            COALESCE(SUM(amount), 0)::float8 AS total_amount
        FROM transactions
        GROUP BY 1
        ORDER BY 1
        LIMIT $1
        "#
    )
    .bind(window)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub hour: String,
    pub fraud_count: i64,
    pub total_count: i64,
}

impl From<HourRow> for HourlyPoint {
    fn from(r: HourRow) -> Self {
        Self {
            hour: format!("{}h", r.hour),
            fraud_count: r.fraud_count,
            total_count: r.total_count,
        }
    }
}

pub async fn hourly(pool: &PgPool) -> Result<Vec<HourlyPoint>, sqlx::Error> {
    Ok(hour_rows(pool, HOURLY_WINDOW)
        .await?
        .into_iter()
        .map(HourlyPoint::from)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub hour: i64,
    pub label: String,
    pub total_count: i64,
    pub fraud_count: i64,
    pub avg_amount: f64,
    pub total_amount: f64,
    /// Percentage with 2 decimals, e.g. "0.17"
    pub fraud_rate: String,
}

impl From<HourRow> for TimeSeriesPoint {
    fn from(r: HourRow) -> Self {
        Self {
            hour: r.hour,
            label: format!("Hour {}", r.hour),
            total_count: r.total_count,
            fraud_count: r.fraud_count,
            avg_amount: round_to(r.avg_amount, 2),
            total_amount: round_to(r.total_amount, 2),
            fraud_rate: format!("{:.2}", ratio(r.fraud_count, r.total_count) * 100.0),
        }
    }
}

pub async fn time_series(pool: &PgPool) -> Result<Vec<TimeSeriesPoint>, sqlx::Error> {
    Ok(hour_rows(pool, TIME_SERIES_WINDOW)
        .await?
        .into_iter()
        .map(TimeSeriesPoint::from)
        .collect())
}

// ============================================================================
// MODEL QUALITY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct ConfusionMatrix {
    pub tn: i64,
    pub fp: i64,
    #[serde(rename = "fn")]
    #[sqlx(rename = "fn")]
    pub false_negatives: i64,
    pub tp: i64,
}

impl ConfusionMatrix {
    /// Records with both labels known
    pub fn total(&self) -> i64 {
        self.tn + self.fp + self.false_negatives + self.tp
    }
}

pub async fn confusion_matrix(pool: &PgPool) -> Result<ConfusionMatrix, sqlx::Error> {
    sqlx::query_as::<_, ConfusionMatrix>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE actual_class = 0 AND predicted_class = 0) AS tn,
            COUNT(*) FILTER (WHERE actual_class = 0 AND predicted_class = 1) AS fp,
            COUNT(*) FILTER (WHERE actual_class = 1 AND predicted_class = 0) AS "fn",
            COUNT(*) FILTER (WHERE actual_class = 1 AND predicted_class = 1) AS tp
        FROM transactions
        WHERE actual_class IS NOT NULL AND predicted_class IS NOT NULL
        "#
    )
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionAccuracy {
    pub total_predicted: i64,
    pub correct_predictions: i64,
    pub wrong_predictions: i64,
    /// Percentage, 2 decimals
    pub accuracy: f64,
}

impl PredictionAccuracy {
    pub fn new(total: i64, correct: i64) -> Self {
        Self {
            total_predicted: total,
            correct_predictions: correct,
            wrong_predictions: total - correct,
            accuracy: round_to(ratio(correct, total) * 100.0, 2),
        }
    }
}

pub async fn prediction_accuracy(pool: &PgPool) -> Result<PredictionAccuracy, sqlx::Error> {
    let (total, correct): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) AS total_predicted,
            COUNT(*) FILTER (WHERE actual_class = predicted_class) AS correct_predictions
        FROM transactions
        WHERE actual_class IS NOT NULL AND predicted_class IS NOT NULL
        "#
    )
    .fetch_one(pool)
    .await?;

    Ok(PredictionAccuracy::new(total, correct))
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TopRiskTransaction {
    pub id: i64,
    pub amount: f64,
    pub fraud_probability: f64,
    pub risk_level: Option<String>,
    pub actual_class: Option<i32>,
    pub predicted_class: Option<i32>,
    pub time_elapsed: f64,
}

pub async fn top_risk(pool: &PgPool) -> Result<Vec<TopRiskTransaction>, sqlx::Error> {
    sqlx::query_as::<_, TopRiskTransaction>(
        r#"
        SELECT id, amount, fraud_probability, risk_level, actual_class, predicted_class, time_elapsed
        FROM transactions
        WHERE fraud_probability IS NOT NULL
        ORDER BY fraud_probability DESC, id
        LIMIT $1
        "#
    )
    .bind(TOP_RISK_LIMIT)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AmountByRisk {
    pub risk_level: String,
    pub count: i64,
    pub avg_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,
    pub total_amount: f64,
}

impl AmountByRisk {
    fn rounded(self) -> Self {
        Self {
            avg_amount: round_to(self.avg_amount, 2),
            min_amount: round_to(self.min_amount, 2),
            max_amount: round_to(self.max_amount, 2),
            total_amount: round_to(self.total_amount, 2),
            ..self
        }
    }
}

pub async fn amount_by_risk(pool: &PgPool) -> Result<Vec<AmountByRisk>, sqlx::Error> {
    let sql = format!(
        "SELECT risk_level, COUNT(*) AS count, \
             AVG(amount)::float8 AS avg_amount, \
             MIN(amount)::float8 AS min_amount, \
             MAX(amount)::float8 AS max_amount, \
             SUM(amount)::float8 AS total_amount \
         FROM transactions \
         WHERE risk_level IS NOT NULL \
         GROUP BY risk_level \
         ORDER BY {RISK_ORDER_SQL}"
    );

    let rows = sqlx::query_as::<_, AmountByRisk>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(AmountByRisk::rounded).collect())
}

// ============================================================================
// REALTIME
// ============================================================================

#[derive(Debug, Clone, Default, FromRow)]
pub struct RealtimeCounts {
    pub total_transactions: i64,
    pub total_fraud: i64,
    pub high_risk_count: i64,
    pub avg_fraud_probability: Option<f64>,
    pub recent_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeSummary {
    pub total_transactions: i64,
    pub total_fraud: i64,
    pub high_risk_count: i64,
    pub avg_fraud_probability: f64,
    pub recent_count: i64,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeSummary {
    pub fn new(c: RealtimeCounts, timestamp: DateTime<Utc>) -> Self {
        Self {
            total_transactions: c.total_transactions,
            total_fraud: c.total_fraud,
            high_risk_count: c.high_risk_count,
            avg_fraud_probability: round_to(c.avg_fraud_probability.unwrap_or(0.0), 4),
            recent_count: c.recent_count,
            timestamp,
        }
    }
}

pub async fn realtime_summary(pool: &PgPool) -> Result<RealtimeSummary, sqlx::Error> {
    let sql = format!(
        "SELECT \
             COUNT(*) AS total_transactions, \
             COUNT(*) FILTER (WHERE actual_class = 1) AS total_fraud, \
             COUNT(*) FILTER (WHERE risk_level = 'HIGH') AS high_risk_count, \
             AVG(fraud_probability)::float8 AS avg_fraud_probability, \
             COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '{RECENT_WINDOW}') AS recent_count \
         FROM transactions"
    );

    let counts = sqlx::query_as::<_, RealtimeCounts>(&sql)
        .fetch_one(pool)
        .await?;

    Ok(RealtimeSummary::new(counts, Utc::now()))
}
