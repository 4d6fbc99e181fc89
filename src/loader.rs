//! Per-batch bulk loading over the COPY protocol.
//!
//! Each invocation serializes one batch into the CSV text form COPY expects
//! (comma separator, empty unquoted field as NULL), streams it through a
//! dedicated pooled connection inside a single transaction, and commits.
//! Failures never escape as errors: every invocation resolves to a
//! [`BatchOutcome`] so a bad batch is reported, not propagated, and sibling
//! batches keep running. There is no retry.

use std::sync::Arc;
use std::time::Duration;

use sqlx::{Acquire, PgPool};

use crate::chunk::Batch;
use crate::error::BatchLoadError;
use crate::infer::{parse_timestamp_text, ColumnSpec, SqlType};
use crate::schema::quote_ident;
use crate::source::{Cell, Row};

/// Outcome of one batch load, consumed by the coordinator's aggregation.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_index: usize,
    pub rows: usize,
    /// Inclusive sheet-row span, for error reporting.
    pub first_row: usize,
    pub last_row: usize,
    /// Rows committed on success, cause on failure.
    pub result: Result<u64, BatchLoadError>,
}

/// Loads batches into one target table. Cheap to clone; safe to run many
/// instances concurrently since every `load` acquires its own connection
/// (COPY is connection-stateful and must never be shared mid-stream).
#[derive(Clone)]
pub struct BulkLoader {
    pool: PgPool,
    table: String,
    columns: Arc<Vec<ColumnSpec>>,
    timeout: Duration,
}

impl BulkLoader {
    pub fn new(
        pool: PgPool,
        table: String,
        columns: Arc<Vec<ColumnSpec>>,
        timeout: Duration,
    ) -> Self {
        Self {
            pool,
            table,
            columns,
            timeout,
        }
    }

    /// Load one batch as a single transaction.
    pub async fn load(&self, batch: Batch) -> BatchOutcome {
        let (first_row, last_row) = batch.row_span();
        let batch_index = batch.index;
        let rows = batch.rows.len();

        let result = self.try_load(&batch).await;

        match &result {
            Ok(copied) => log::debug!("batch {} committed ({} rows)", batch_index, copied),
            Err(e) => log::warn!(
                "batch {} (rows {}..{}) failed: {}",
                batch_index,
                first_row,
                last_row,
                e
            ),
        }

        BatchOutcome {
            batch_index,
            rows,
            first_row,
            last_row,
            result,
        }
    }

    async fn try_load(&self, batch: &Batch) -> Result<u64, BatchLoadError> {
        let payload = encode_batch(batch, &self.columns)?;

        match tokio::time::timeout(self.timeout, self.copy_payload(payload)).await {
            Ok(result) => result,
            Err(_) => Err(BatchLoadError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn copy_payload(&self, payload: String) -> Result<u64, BatchLoadError> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let statement = copy_statement(&self.table, &self.columns);
        let mut sink = (&mut *tx).copy_in_raw(&statement).await?;
        sink.send(payload.into_bytes()).await?;
        let copied = sink.finish().await?;

        // Not committing on any earlier error rolls the whole batch back.
        tx.commit().await?;

        Ok(copied)
    }
}

/// The COPY statement with an explicit column list, so the payload is tied
/// to header order rather than whatever order the table ended up with.
pub fn copy_statement(table: &str, columns: &[ColumnSpec]) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '')",
        quote_ident(table),
        column_list.join(", ")
    )
}

/// Serialize a batch to COPY CSV text, coercing each cell against its
/// column's inferred type. A value the type cannot hold is a serialization
/// failure naming the row and column; the batch never reaches the wire.
pub fn encode_batch(batch: &Batch, columns: &[ColumnSpec]) -> Result<String, BatchLoadError> {
    // Rough preallocation: a dozen bytes per field.
    let mut out = String::with_capacity(batch.rows.len() * columns.len() * 12);

    for row in &batch.rows {
        encode_row(&mut out, row, columns)?;
    }

    Ok(out)
}

fn encode_row(out: &mut String, row: &Row, columns: &[ColumnSpec]) -> Result<(), BatchLoadError> {
    for (idx, spec) in columns.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        let cell = row.cells.get(idx).unwrap_or(&Cell::Null);
        encode_cell(out, cell, spec, row.number)?;
    }
    out.push('\n');
    Ok(())
}

fn encode_cell(
    out: &mut String,
    cell: &Cell,
    spec: &ColumnSpec,
    row: usize,
) -> Result<(), BatchLoadError> {
    // An empty unquoted field is the NULL sentinel in every column type.
    if matches!(cell, Cell::Null) {
        return Ok(());
    }

    match spec.sql_type {
        SqlType::Integer => match cell {
            Cell::Int(i) => {
                out.push_str(&i.to_string());
                Ok(())
            }
            Cell::Float(f) if f.fract() == 0.0 && in_i64_range(*f) => {
                out.push_str(&(*f as i64).to_string());
                Ok(())
            }
            Cell::Text(s) if s.trim().parse::<i64>().is_ok() => {
                out.push_str(s.trim());
                Ok(())
            }
            other => Err(coercion_error(other, spec, row)),
        },
        SqlType::DoublePrecision => match cell {
            Cell::Int(i) => {
                out.push_str(&i.to_string());
                Ok(())
            }
            Cell::Float(f) if f.is_finite() => {
                out.push_str(&f.to_string());
                Ok(())
            }
            Cell::Text(s) if s.trim().parse::<f64>().is_ok_and(|v| v.is_finite()) => {
                out.push_str(s.trim());
                Ok(())
            }
            other => Err(coercion_error(other, spec, row)),
        },
        SqlType::Timestamp => match cell {
            Cell::Timestamp(ts) => {
                out.push_str(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string());
                Ok(())
            }
            Cell::Text(s) => match parse_timestamp_text(s) {
                Some(ts) => {
                    out.push_str(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string());
                    Ok(())
                }
                None => Err(coercion_error(cell, spec, row)),
            },
            other => Err(coercion_error(other, spec, row)),
        },
        SqlType::Text => {
            match cell {
                Cell::Text(s) => push_csv_text(out, s),
                // Numbers, bools and timestamps render as their display form;
                // none of those contain CSV metacharacters.
                other => out.push_str(&other.display()),
            }
            Ok(())
        }
    }
}

fn in_i64_range(f: f64) -> bool {
    f >= i64::MIN as f64 && f <= i64::MAX as f64
}

fn coercion_error(cell: &Cell, spec: &ColumnSpec, row: usize) -> BatchLoadError {
    BatchLoadError::Encode {
        row,
        column: spec.name.clone(),
        value: format!("{} ({})", cell.display(), cell.kind()),
        expected: spec.sql_type.ddl(),
    }
}

/// Quote a TEXT value when needed. A quoted empty string stays an empty
/// string; an unquoted empty field would read back as NULL.
fn push_csv_text(out: &mut String, s: &str) {
    let needs_quoting =
        s.is_empty() || s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');

    if !needs_quoting {
        out.push_str(s);
        return;
    }

    out.push('"');
    for c in s.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}
