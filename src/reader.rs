//! Delimited-text row reading with header validation.
//!
//! A [`RowReader`] is scoped to one file: it validates the header line
//! against the expected column list before yielding anything, then produces
//! [`RawRow`] values lazily in file order. The row-count query re-scans the
//! file through a second handle so it never disturbs the main cursor.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{Reader, ReaderBuilder, StringRecord};

use crate::error::ImportError;

/// One decoded data line: an ordered mapping from column name to string
/// value. Column lookup goes through the shared header so every row of a file
/// reuses the same allocation.
#[derive(Debug, Clone)]
pub struct RawRow {
    header: Arc<Vec<String>>,
    record: StringRecord,
}

impl RawRow {
    /// Returns the value of `column`, or `None` if the column does not exist
    /// in this file's header. An empty field returns `Some("")`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.header.iter().position(|c| c == column)?;
        self.record.get(idx)
    }

    /// 1-based position of this data row within the file.
    pub fn position(&self) -> usize {
        // Line 1 is the header; csv reports the physical line.
        self.record
            .position()
            .map(|p| p.line() as usize - 1)
            .unwrap_or(0)
    }
}

/// Reads one GTFS flat file. Construction validates the header; iteration is
/// restartable by constructing a new reader for the same path.
#[derive(Debug)]
pub struct RowReader {
    path: PathBuf,
    header: Arc<Vec<String>>,
    inner: Reader<File>,
}

impl RowReader {
    /// Opens `path` and checks its header line against `expected` columns.
    /// Any missing, extra, or reordered column fails with
    /// [`ImportError::HeaderMismatch`] before a single row is yielded.
    pub fn open(path: &Path, expected: &[&str]) -> Result<Self, ImportError> {
        if !path.is_file() {
            return Err(ImportError::FileNotFound(path.to_path_buf()));
        }

        let mut inner = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)?;

        let found: Vec<String> = inner.headers()?.iter().map(str::to_string).collect();
        if found.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(ImportError::HeaderMismatch {
                file: file_name(path),
                expected: expected.iter().map(|c| c.to_string()).collect(),
                found,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            header: Arc::new(found),
            inner,
        })
    }

    /// Lazy iterator over the data rows, preserving file order.
    pub fn rows(&mut self) -> impl Iterator<Item = Result<RawRow, ImportError>> + '_ {
        let header = Arc::clone(&self.header);
        self.inner.records().map(move |rec| {
            Ok(RawRow {
                header: Arc::clone(&header),
                record: rec?,
            })
        })
    }

    /// Total number of data lines, counted by a full pre-scan through a fresh
    /// file handle. The main iteration cursor is unaffected.
    pub fn row_count(&self) -> Result<usize, ImportError> {
        let mut scan = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let mut count = 0;
        let mut record = StringRecord::new();
        while scan.read_record(&mut record)? {
            count += 1;
        }
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
