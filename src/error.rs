use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems, surfaced before any I/O happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
}

/// Failures while opening or decoding the source workbook.
///
/// These are unrecoverable: nothing has been dispatched yet, so the run
/// aborts without touching the database.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open workbook {path:?}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {path:?} has no sheets")]
    NoSheets { path: PathBuf },

    #[error("sheet '{sheet}' has no header row")]
    MissingHeader { sheet: String },
}

/// Table creation or truncation failed.
///
/// Schema management runs alone, before any batch is dispatched, so this
/// also aborts the whole run.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A single batch failed to load. Siblings are unaffected; the coordinator
/// collects these into the final report instead of aborting.
#[derive(Debug, Error)]
pub enum BatchLoadError {
    #[error("row {row}, column \"{column}\": cannot coerce {value:?} into {expected}")]
    Encode {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("copy timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Coordinator-level failure: the abort cases plus worker-task panics.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("background task failed: {0}")]
    Task(String),
}
