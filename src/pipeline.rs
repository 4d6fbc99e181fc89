//! Load orchestration.
//!
//! The coordinator walks the run through its phases: open the workbook and
//! pull the inference sample, derive and ensure the target schema, then fan
//! batches out to a fixed pool of loader tasks and aggregate their outcomes.
//!
//! One blocking producer owns the decode path (workbook rows → chunker) and
//! feeds a bounded channel whose capacity equals the worker count, so a
//! saturated pool applies backpressure to the producer and in-flight memory
//! stays at O(workers × chunk size). Workers pull from the shared channel
//! until it closes, run one batch to completion at a time, and push every
//! outcome into a results channel. A failed batch never cancels its
//! siblings; the run drains fully and reports every failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::chunk::{Batch, Chunker};
use crate::config::Config;
use crate::error::{BatchLoadError, LoadError};
use crate::infer::{infer_columns, ColumnSpec};
use crate::loader::{BatchOutcome, BulkLoader};
use crate::schema;
use crate::source::{ExcelSource, Row};

/// One failed batch in the final report.
#[derive(Debug)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub first_row: usize,
    pub last_row: usize,
    pub error: BatchLoadError,
}

/// Aggregate result of a run that made it past schema setup.
#[derive(Debug)]
pub struct LoadReport {
    pub elapsed: Duration,
    pub batches: usize,
    pub rows: usize,
    pub batches_succeeded: usize,
    pub rows_loaded: u64,
    pub failures: Vec<BatchFailure>,
}

impl LoadReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, outcome: BatchOutcome) {
        match outcome.result {
            Ok(copied) => {
                self.batches_succeeded += 1;
                self.rows_loaded += copied;
            }
            Err(error) => self.failures.push(BatchFailure {
                batch_index: outcome.batch_index,
                first_row: outcome.first_row,
                last_row: outcome.last_row,
                error,
            }),
        }
    }

    /// Emit the user-facing summary: elapsed time, attempted and succeeded
    /// counts, and every failed batch with its cause.
    pub fn log_summary(&self) {
        log::info!(
            "load finished in {:.2}s: {}/{} batches succeeded, {} of {} rows loaded",
            self.elapsed.as_secs_f64(),
            self.batches_succeeded,
            self.batches,
            self.rows_loaded,
            self.rows
        );

        for failure in &self.failures {
            log::error!(
                "batch {} (rows {}..{}) failed: {}",
                failure.batch_index,
                failure.first_row,
                failure.last_row,
                failure.error
            );
        }
    }
}

/// Drives the whole pipeline for one run.
pub struct LoadCoordinator {
    config: Config,
    pool: PgPool,
}

impl LoadCoordinator {
    pub fn new(config: Config, pool: PgPool) -> Self {
        Self { config, pool }
    }

    /// Run the load to completion.
    ///
    /// Setup failures (decode, schema) abort with nothing dispatched.
    /// Batch failures do not: the returned report lists them while sibling
    /// batches stay committed.
    pub async fn run(self) -> Result<LoadReport, LoadError> {
        let started = Instant::now();

        // Decoding the workbook is blocking, CPU-bound work; keep it off
        // the async runtime.
        let path = self.config.file_path.clone();
        let mut source = tokio::task::spawn_blocking(move || ExcelSource::open(&path))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))??;

        let header = source.header().to_vec();
        let sample_size = self.config.sample.sample_size(self.config.chunk_size);
        let sample: Vec<Row> = source.by_ref().take(sample_size).collect();

        let columns = Arc::new(infer_columns(&header, &sample));
        for spec in columns.iter() {
            log::debug!("column \"{}\" typed as {}", spec.name, spec.sql_type.ddl());
        }

        // Schema work must commit before any loader starts; nothing has
        // been dispatched yet, so a failure here aborts the whole run.
        schema::ensure_table(&self.pool, &self.config.table, &columns).await?;

        let report = self.dispatch(source, sample, columns, started).await?;
        report.log_summary();
        Ok(report)
    }

    async fn dispatch(
        &self,
        source: ExcelSource,
        sample: Vec<Row>,
        columns: Arc<Vec<ColumnSpec>>,
        started: Instant,
    ) -> Result<LoadReport, LoadError> {
        let workers = self.config.workers;
        log::info!(
            "dispatching batches of {} rows across {} workers",
            self.config.chunk_size,
            workers
        );

        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(workers);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<BatchOutcome>();
        let batch_rx = Arc::new(tokio::sync::Mutex::new(batch_rx));

        let loader = BulkLoader::new(
            self.pool.clone(),
            self.config.table.clone(),
            columns,
            self.config.copy_timeout,
        );

        let mut worker_handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let batch_rx = batch_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let loader = loader.clone();

            worker_handles.push(tokio::spawn(async move {
                loop {
                    // Take the next batch, releasing the queue lock before
                    // the load so siblings keep draining in parallel.
                    let batch = { batch_rx.lock().await.recv().await };
                    let Some(batch) = batch else { break };

                    log::debug!(
                        "worker {}: loading batch {} ({} rows)",
                        worker_id,
                        batch.index,
                        batch.rows.len()
                    );

                    let outcome = loader.load(batch).await;
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(outcome_tx);

        // The producer owns the source: sampled rows are chained back in
        // front of the remaining stream so they are loaded like any others.
        let chunk_size = self.config.chunk_size;
        let producer = tokio::task::spawn_blocking(move || {
            let mut batches = 0usize;
            let mut rows = 0usize;
            for batch in Chunker::new(sample.into_iter().chain(source), chunk_size) {
                batches += 1;
                rows += batch.rows.len();
                // blocking_send suspends the producer while the pool and
                // queue are saturated; an Err means every worker is gone.
                if batch_tx.blocking_send(batch).is_err() {
                    break;
                }
            }
            (batches, rows)
        });

        let (batches, rows) = producer
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?;
        log::info!("producer done: {} batches, {} rows; draining workers", batches, rows);

        for handle in worker_handles {
            handle.await.map_err(|e| LoadError::Task(e.to_string()))?;
        }

        let mut report = LoadReport {
            elapsed: Duration::ZERO,
            batches,
            rows,
            batches_succeeded: 0,
            rows_loaded: 0,
            failures: Vec::new(),
        };
        while let Some(outcome) = outcome_rx.recv().await {
            report.record(outcome);
        }
        report.failures.sort_by_key(|f| f.batch_index);
        report.elapsed = started.elapsed();

        Ok(report)
    }
}
