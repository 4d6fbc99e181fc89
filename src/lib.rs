//! Streaming bulk ingestion from Excel workbooks into PostgreSQL.
//!
//! # Architecture Overview
//!
//! The pipeline moves rows from a large spreadsheet into one relational
//! table over the database's COPY fast path, without materializing the file
//! downstream of the decoder and without serializing writes behind a single
//! connection.
//!
//! ## Core Components
//!
//! - **`source`**: wraps the calamine decoder behind a forward-only row
//!   iterator; the header is consumed once to fix column order.
//!
//! - **`infer`**: derives one SQL type per column from a bounded sample
//!   (first row or first chunk). Types are fixed for the whole run; later
//!   rows that cannot be coerced fail their batch rather than being
//!   silently miscoerced.
//!
//! - **`schema`**: creates the target table if absent and truncates it, in
//!   one transaction, strictly before dispatch begins.
//!
//! - **`chunk`**: groups the row stream into bounded batches, holding at
//!   most one batch so peak memory tracks the chunk size.
//!
//! - **`loader`**: serializes a batch to COPY CSV text and commits it over
//!   a dedicated connection as one transaction; every invocation resolves
//!   to a per-batch outcome instead of propagating an error.
//!
//! - **`pipeline`**: the coordinator. A blocking producer feeds a bounded
//!   channel (backpressure at pool capacity); a fixed worker pool loads
//!   batches concurrently; outcomes aggregate into a final report that
//!   lists every failure, not just the first.
//!
//! ## Data Flow
//!
//! file → source → (sample) infer → schema → chunk → bounded channel →
//! worker pool of loaders → PostgreSQL. Batches commit independently, in
//! any order; rows within a batch keep source order.

pub mod chunk;
pub mod config;
pub mod error;
pub mod infer;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod source;

pub use chunk::{Batch, Chunker};
pub use config::{Config, SampleStrategy};
pub use error::{BatchLoadError, ConfigError, DecodeError, LoadError, SchemaError};
pub use infer::{infer_columns, ColumnSpec, SqlType};
pub use loader::{BatchOutcome, BulkLoader};
pub use pipeline::{LoadCoordinator, LoadReport};
pub use source::{Cell, ExcelSource, Row};
