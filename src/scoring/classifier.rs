//! Classifier capability and its subprocess implementation
//!
//! The trained model lives outside this process. `ProcessClassifier` runs
//! the model's entry script once per call, writes one JSON request line to
//! its stdin and reads a single JSON document from its stdout when it exits:
//!
//! ```text
//! single:  {"features": [v1, ..., v28, amount]}     -> {prediction, fraud_probability, ...}
//! batch:   {"features": [[...], [...], ...]}         -> [{...}, {...}, ...]
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::features::FeatureVector;

/// Diagnostic kept from a failing classifier's stderr
const MAX_DIAGNOSTIC_LEN: usize = 2048;

/// Verdict as emitted by the classifier; every field is untrusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVerdict {
    #[serde(default)]
    pub prediction: Option<i64>,
    #[serde(default)]
    pub fraud_probability: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to start classifier: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("classifier I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("classifier exited with {code}: {stderr}")]
    Exited { code: String, stderr: String },

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid classifier output: {0}")]
    InvalidOutput(String),

    #[error("classifier returned {got} results for {expected} inputs")]
    BatchLengthMismatch { expected: usize, got: usize },

    #[error("invalid verdict: {0}")]
    InvalidVerdict(String),
}

impl ClassifierError {
    /// Spawn failures (fork limits, busy executables) may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, ClassifierError::Spawn(_))
    }
}

/// Something that can score feature vectors.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn score(&self, features: &FeatureVector) -> Result<RawVerdict, ClassifierError>;

    /// Results come back in input order, one per vector.
    async fn score_batch(&self, batch: &[FeatureVector]) -> Result<Vec<RawVerdict>, ClassifierError>;
}

/// Bounded exponential backoff for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs an external program per invocation.
#[derive(Debug, Clone)]
pub struct ProcessClassifier {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ProcessClassifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// `python3 <model_dir>/predict.py` with MODEL_DIR exported
    pub fn python(python_path: &str, script: PathBuf, model_dir: PathBuf) -> Self {
        Self::new(python_path)
            .arg(script.to_string_lossy())
            .env("MODEL_DIR", model_dir.to_string_lossy())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Invoke with retries on transient failures, returning raw stdout.
    async fn invoke(&self, request: serde_json::Value) -> Result<String, ClassifierError> {
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| ClassifierError::InvalidOutput(e.to_string()))?;
        line.push(b'\n');

        let mut attempt = 0;
        loop {
            // Detached so an abandoned request does not abort the classifier
            let job = tokio::spawn(run_once(self.clone(), line.clone()));
            let result = match job.await {
                Ok(result) => result,
                Err(join_err) => Err(ClassifierError::InvalidOutput(format!(
                    "classifier task failed: {join_err}"
                ))),
            };

            match result {
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Classifier spawn failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

async fn run_once(classifier: ProcessClassifier, request: Vec<u8>) -> Result<String, ClassifierError> {
    let started = Instant::now();

    let mut child = Command::new(&classifier.program)
        .args(&classifier.args)
        .envs(classifier.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ClassifierError::Spawn)?;

    // One deadline covers the request write and the wait: a large batch
    // fills the pipe and blocks until the child reads. Dropping the
    // exchange on timeout drops the child, which kills it.
    let stdin = child.stdin.take();
    let exchange = async move {
        if let Some(mut stdin) = stdin {
            // A classifier that exits without reading closes the pipe early;
            // its exit status carries the real diagnostic.
            if let Err(e) = stdin.write_all(&request).await {
                tracing::debug!("Classifier closed stdin early: {}", e);
            }
            drop(stdin);
        }
        child.wait_with_output().await
    };

    let output = tokio::time::timeout(classifier.timeout, exchange)
        .await
        .map_err(|_| ClassifierError::Timeout(classifier.timeout))??;

    tracing::debug!(
        program = %classifier.program,
        elapsed_ms = started.elapsed().as_millis() as u64,
        status = %output.status,
        "Classifier finished"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .status
            .code()
            .map(|c| format!("status {c}"))
            .unwrap_or_else(|| "signal".to_string());
        return Err(ClassifierError::Exited {
            code,
            stderr: truncate(stderr.trim(), MAX_DIAGNOSTIC_LEN),
        });
    }

    String::from_utf8(output.stdout)
        .map_err(|e| ClassifierError::InvalidOutput(e.to_string()))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(stdout: &str) -> Result<T, ClassifierError> {
    serde_json::from_str(stdout.trim()).map_err(|e| {
        ClassifierError::InvalidOutput(format!("{e}: {}", truncate(stdout.trim(), 256)))
    })
}

#[async_trait]
impl Classifier for ProcessClassifier {
    async fn score(&self, features: &FeatureVector) -> Result<RawVerdict, ClassifierError> {
        let stdout = self.invoke(json!({ "features": features })).await?;
        parse_document(&stdout)
    }

    async fn score_batch(&self, batch: &[FeatureVector]) -> Result<Vec<RawVerdict>, ClassifierError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let stdout = self.invoke(json!({ "features": batch })).await?;
        let verdicts: Vec<RawVerdict> = parse_document(&stdout)?;

        if verdicts.len() != batch.len() {
            return Err(ClassifierError::BatchLengthMismatch {
                expected: batch.len(),
                got: verdicts.len(),
            });
        }

        Ok(verdicts)
    }
}
