//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum pooled database connections
    pub db_max_connections: u32,

    /// Server port
    pub port: u16,

    /// Interpreter used to run the classifier script
    pub python_path: String,

    /// Directory holding `predict.py` and `model_meta.json`
    pub model_dir: PathBuf,

    /// Directory holding the training pipeline output
    pub spark_dir: PathBuf,

    /// Upper bound on a single classifier invocation
    pub predict_timeout: Duration,

    /// Retries for classifier spawn failures
    pub predict_max_retries: u32,

    /// Labeled CSV used by the seed binary
    pub csv_path: PathBuf,

    /// Rows per ingestion chunk
    pub seed_batch_size: usize,

    /// Drop and recreate the table before seeding
    pub seed_reset: bool,

    /// Environment (development, production)
    pub environment: String,
}

/// Largest ingestion chunk; 34 bound parameters per row must stay under
/// the Postgres limit of 65535.
pub const MAX_SEED_BATCH_SIZE: usize = 1000;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let spark_dir: PathBuf = env::var("SPARK_DIR")
            .unwrap_or_else(|_| "spark".to_string())
            .into();

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| database_url_from_parts()),

            db_max_connections: parse_env("DB_MAX_CONNECTIONS").unwrap_or(10),

            port: parse_env("PORT").unwrap_or(8000),

            python_path: env::var("PYTHON_PATH")
                .unwrap_or_else(|_| "python3".to_string()),

            model_dir: env::var("MODEL_DIR")
                .unwrap_or_else(|_| "model".to_string())
                .into(),

            predict_timeout: Duration::from_secs(parse_env("PREDICT_TIMEOUT_SECS").unwrap_or(30)),

            predict_max_retries: parse_env("PREDICT_MAX_RETRIES").unwrap_or(2),

            csv_path: env::var("CSV_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| spark_dir.join("data").join("creditcard.csv")),

            seed_batch_size: parse_env::<usize>("SEED_BATCH_SIZE")
                .unwrap_or(500)
                .clamp(1, MAX_SEED_BATCH_SIZE),

            seed_reset: env::var("SEED_RESET")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            spark_dir,
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Path of the classifier entry script
    pub fn predict_script(&self) -> PathBuf {
        self.model_dir.join("predict.py")
    }

    /// Database URL safe for logging (credentials stripped)
    pub fn redacted_database_url(&self) -> &str {
        self.database_url.rsplit('@').next().unwrap_or("***")
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Compose a URL from the individual DB_* variables used by container setups.
fn database_url_from_parts() -> String {
    let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let name = env::var("DB_NAME").unwrap_or_else(|_| "fraudlens".to_string());
    let user = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = env::var("DB_PASSWORD").unwrap_or_else(|_| "postgres".to_string());

    format!("postgres://{user}:{password}@{host}:{port}/{name}")
}
