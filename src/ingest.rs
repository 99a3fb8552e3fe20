//! Bulk ingestion of labeled historical transactions
//!
//! Reads the labeled CSV export (`Time, V1..V28, Amount, Class`), scores it
//! chunk by chunk through the batch bridge and stores each chunk with one
//! multi-row insert. Unparseable numbers are coerced rather than rejected,
//! and a chunk whose scoring call fails is stored unscored.

use csv::{ReaderBuilder, StringRecord};
use sqlx::PgPool;
use std::io::Read;
use std::time::Instant;

use crate::models::{NewTransaction, Transaction};
use crate::scoring::{FeatureVector, ScoringBridge, PCA_FEATURE_COUNT};

/// Progress is logged each time this many more rows are stored
const PROGRESS_EVERY: u64 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("CSV header is missing column {0}")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to store chunk starting at row {first_row}: {source}")]
    Storage { first_row: u64, source: sqlx::Error },

    #[error("CSV reader task failed: {0}")]
    Reader(#[from] tokio::task::JoinError),
}

/// Column positions resolved from the header
#[derive(Debug, Clone, PartialEq)]
pub struct CsvLayout {
    pca: [usize; PCA_FEATURE_COUNT],
    amount: usize,
    time: Option<usize>,
    class: Option<usize>,
}

impl CsvLayout {
    pub fn from_headers(headers: &StringRecord) -> Result<Self, IngestError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| clean(h).eq_ignore_ascii_case(name))
        };

        let mut pca = [0usize; PCA_FEATURE_COUNT];
        for (i, slot) in pca.iter_mut().enumerate() {
            let name = format!("V{}", i + 1);
            *slot = find(&name).ok_or(IngestError::MissingColumn(name))?;
        }

        Ok(Self {
            pca,
            amount: find("Amount").ok_or_else(|| IngestError::MissingColumn("Amount".to_string()))?,
            time: find("Time"),
            class: find("Class"),
        })
    }

    /// Build a record, coercing bad cells: features/amount/time to 0, label to null
    pub fn row(&self, record: &StringRecord) -> NewTransaction {
        let number = |idx: usize| parse_number(record.get(idx));

        let mut pca = [0.0; PCA_FEATURE_COUNT];
        for (value, &idx) in pca.iter_mut().zip(self.pca.iter()) {
            *value = number(idx).unwrap_or(0.0);
        }

        NewTransaction {
            features: FeatureVector::new(pca, number(self.amount).unwrap_or(0.0)),
            time_elapsed: self.time.and_then(number).unwrap_or(0.0),
            actual_class: self.class.and_then(number).and_then(parse_label),
            prediction: None,
        }
    }
}

fn clean(cell: &str) -> &str {
    cell.trim().trim_matches('"').trim()
}

fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.map(clean)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_label(value: f64) -> Option<i32> {
    if value == 0.0 {
        Some(0)
    } else if value == 1.0 {
        Some(1)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub inserted: u64,
    pub scored: u64,
}

/// Reads `source` to the end, storing it in chunks of `batch_size` rows.
///
/// `source` is a blocking reader; parsing runs on the blocking pool, one
/// chunk at a time, while scoring and inserts stay on the runtime.
pub async fn ingest_csv<R>(
    pool: &PgPool,
    bridge: &ScoringBridge,
    source: R,
    batch_size: usize,
) -> Result<IngestReport, IngestError>
where
    R: Read + Send + 'static,
{
    let started = Instant::now();
    let batch_size = batch_size.max(1);

    let (layout, mut records) = tokio::task::spawn_blocking(move || {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);
        let layout = CsvLayout::from_headers(reader.headers()?)?;
        Ok::<_, IngestError>((layout, reader.into_records()))
    })
    .await??;

    let mut report = IngestReport::default();
    loop {
        let chunk_layout = layout.clone();
        let (returned, chunk, counted) = tokio::task::spawn_blocking(move || {
            let mut counted = report;
            let chunk = read_chunk(&mut records, &chunk_layout, batch_size, &mut counted);
            (records, chunk, counted)
        })
        .await?;
        records = returned;
        report = counted;

        if chunk.is_empty() {
            break;
        }

        let stored_before = report.inserted;
        let (inserted, scored) = store_chunk(pool, bridge, chunk, report.inserted).await?;
        report.inserted += inserted;
        report.scored += scored;

        if report.inserted / PROGRESS_EVERY > stored_before / PROGRESS_EVERY {
            tracing::info!(inserted = report.inserted, scored = report.scored, "Ingestion progress");
        }
    }

    tracing::info!(
        rows_read = report.rows_read,
        rows_skipped = report.rows_skipped,
        inserted = report.inserted,
        scored = report.scored,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Ingestion finished"
    );
    Ok(report)
}

/// Next `batch_size` well-formed rows; unreadable records are skipped.
fn read_chunk<I>(
    records: &mut I,
    layout: &CsvLayout,
    batch_size: usize,
    report: &mut IngestReport,
) -> Vec<NewTransaction>
where
    I: Iterator<Item = Result<StringRecord, csv::Error>>,
{
    let mut chunk = Vec::with_capacity(batch_size);

    while chunk.len() < batch_size {
        match records.next() {
            Some(Ok(record)) => {
                report.rows_read += 1;
                chunk.push(layout.row(&record));
            }
            Some(Err(e)) => {
                report.rows_read += 1;
                report.rows_skipped += 1;
                tracing::warn!(error = %e, "Skipping unreadable CSV record");
            }
            None => break,
        }
    }

    chunk
}

async fn store_chunk(
    pool: &PgPool,
    bridge: &ScoringBridge,
    mut chunk: Vec<NewTransaction>,
    first_row: u64,
) -> Result<(u64, u64), IngestError> {
    let vectors: Vec<FeatureVector> = chunk.iter().map(|row| row.features).collect();
    let predictions = bridge.score_batch_or_unscored(&vectors).await;

    let mut scored = 0;
    for (row, prediction) in chunk.iter_mut().zip(predictions) {
        scored += u64::from(prediction.is_some());
        row.prediction = prediction;
    }

    let inserted = Transaction::insert_many(pool, &chunk)
        .await
        .map_err(|source| IngestError::Storage { first_row, source })?;

    Ok((inserted, scored))
}
