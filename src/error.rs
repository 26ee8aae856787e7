//! Error types for the import pipeline.
//!
//! Every per-file and per-row failure mode gets its own variant so the
//! orchestrator can record a precise reason in the run report. Recoverability
//! is decided at the catch site, not encoded in the type: the orchestrator
//! treats all of these as fatal to one file and non-fatal to the run, while
//! store errors from `clear`/`insert` are allowed to escape as systemic.

use std::path::PathBuf;

use thiserror::Error;

/// A conversion failure for a single column of a single row, produced by the
/// `from_row` constructors in [`crate::model`]. The row index is attached by
/// the importer, which is the only place that knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub column: String,
    pub message: String,
}

impl RowError {
    pub fn new(column: &str, message: impl Into<String>) -> Self {
        Self {
            column: column.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("directory '{0}' does not exist")]
    DirectoryNotFound(PathBuf),

    #[error("file '{0}' does not exist")]
    FileNotFound(PathBuf),

    #[error("file '{0}' does not have a supported importer")]
    UnsupportedFileType(String),

    #[error("header mismatch in '{file}': expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        file: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("row {row} of '{file}', column '{column}': {message}")]
    RowConversion {
        file: String,
        /// 1-based index of the data row, excluding the header line.
        row: usize,
        column: String,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ImportError {
    /// Wraps a [`RowError`] with the file and row position where it occurred.
    pub fn row_conversion(file: &str, row: usize, err: RowError) -> Self {
        ImportError::RowConversion {
            file: file.to_string(),
            row,
            column: err.column,
            message: err.message,
        }
    }
}

/// Failure inside a persistence backend. These are systemic: the orchestrator
/// does not convert them into per-file report entries but aborts the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failure: {0}")]
    Serialize(#[from] csv::Error),
}
