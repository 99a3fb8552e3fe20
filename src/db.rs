//! Database module - PostgreSQL connection and schema

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply the schema (idempotent)
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Drop the transactions table and recreate it empty
pub async fn reset(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DROP TABLE IF EXISTS transactions CASCADE")
        .execute(pool)
        .await?;
    tracing::warn!("Transactions table dropped");

    run_migrations(pool).await
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Scored transactions (append-only)
CREATE TABLE IF NOT EXISTS transactions (
    id BIGSERIAL PRIMARY KEY,
    v1 DOUBLE PRECISION NOT NULL,
    v2 DOUBLE PRECISION NOT NULL,
    v3 DOUBLE PRECISION NOT NULL,
    v4 DOUBLE PRECISION NOT NULL,
    v5 DOUBLE PRECISION NOT NULL,
    v6 DOUBLE PRECISION NOT NULL,
    v7 DOUBLE PRECISION NOT NULL,
    v8 DOUBLE PRECISION NOT NULL,
    v9 DOUBLE PRECISION NOT NULL,
    v10 DOUBLE PRECISION NOT NULL,
    v11 DOUBLE PRECISION NOT NULL,
    v12 DOUBLE PRECISION NOT NULL,
    v13 DOUBLE PRECISION NOT NULL,
    v14 DOUBLE PRECISION NOT NULL,
    v15 DOUBLE PRECISION NOT NULL,
    v16 DOUBLE PRECISION NOT NULL,
    v17 DOUBLE PRECISION NOT NULL,
    v18 DOUBLE PRECISION NOT NULL,
    v19 DOUBLE PRECISION NOT NULL,
    v20 DOUBLE PRECISION NOT NULL,
    v21 DOUBLE PRECISION NOT NULL,
    v22 DOUBLE PRECISION NOT NULL,
    v23 DOUBLE PRECISION NOT NULL,
    v24 DOUBLE PRECISION NOT NULL,
    v25 DOUBLE PRECISION NOT NULL,
    v26 DOUBLE PRECISION NOT NULL,
    v27 DOUBLE PRECISION NOT NULL,
    v28 DOUBLE PRECISION NOT NULL,
    amount DOUBLE PRECISION NOT NULL DEFAULT 0,
    time_elapsed DOUBLE PRECISION NOT NULL DEFAULT 0,
    actual_class INTEGER CHECK (actual_class IN (0, 1)),
    predicted_class INTEGER CHECK (predicted_class IN (0, 1)),
    fraud_probability DOUBLE PRECISION CHECK (fraud_probability BETWEEN 0 AND 1),
    risk_level VARCHAR(10) CHECK (risk_level IN ('LOW', 'MEDIUM', 'HIGH')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_transactions_created ON transactions(created_at);
CREATE INDEX IF NOT EXISTS idx_transactions_risk ON transactions(risk_level);
CREATE INDEX IF NOT EXISTS idx_transactions_class ON transactions(actual_class);
CREATE INDEX IF NOT EXISTS idx_transactions_probability ON transactions(fraud_probability);
CREATE INDEX IF NOT EXISTS idx_transactions_amount ON transactions(amount);
"#;
