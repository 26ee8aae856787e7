//! Run orchestration.
//!
//! Drives the static importer set across the fixed file list, one file at a
//! time. A file can skip, fail, or complete; none of those outcomes stops the
//! files after it. Only store-level failures abort the run, in which case no
//! report is emitted. The finished report is handed to the event sink as one
//! structured event whose attribute shape matches what downstream consumers
//! of past events already expect.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::ImportError;
use crate::events::{EventSink, EventType};
use crate::fetch::HttpClient;
use crate::realtime::RealTimeImporter;
use crate::registry::{FileKind, get_importer_for_file, open_reader};
use crate::store::{RealtimeStore, StaticStore};

/// Terminal state of one file within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Skipped { reason: String },
    Failed { reason: String },
    Completed { row_count: usize, time_taken_s: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportFileReport {
    pub kind: FileKind,
    pub outcome: FileOutcome,
}

/// Aggregated result of one static import run. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRunReport {
    pub dataset: String,
    pub files: Vec<ImportFileReport>,
    pub total_time_taken_s: f64,
}

impl ImportRunReport {
    pub fn file(&self, kind: FileKind) -> Option<&FileOutcome> {
        self.files
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| &f.outcome)
    }

    /// Event attribute shape consumed by downstream event readers:
    /// `{dataset, totals: {<base>: {"time_taken(s)", row_count, error?}},
    /// "total_time_taken(s)"}`.
    pub fn attributes(&self) -> Value {
        let mut totals = serde_json::Map::new();
        for file in &self.files {
            let entry = match &file.outcome {
                FileOutcome::Completed {
                    row_count,
                    time_taken_s,
                } => json!({
                    "time_taken(s)": time_taken_s,
                    "row_count": row_count,
                }),
                FileOutcome::Skipped { reason } | FileOutcome::Failed { reason } => json!({
                    "time_taken(s)": 0,
                    "row_count": 0,
                    "error": reason,
                }),
            };
            totals.insert(file.kind.base_name().to_string(), entry);
        }
        json!({
            "dataset": self.dataset,
            "totals": totals,
            "total_time_taken(s)": self.total_time_taken_s,
        })
    }
}

/// Result of one realtime import cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeRunReport {
    pub dataset: String,
    pub total_trips: usize,
    pub total_stop_times: usize,
    pub time_taken_s: f64,
}

impl RealtimeRunReport {
    pub fn attributes(&self) -> Value {
        json!({
            "dataset": self.dataset,
            "total_trips": self.total_trips,
            "total_stop_times": self.total_stop_times,
            "time_taken(s)": self.time_taken_s,
        })
    }
}

/// Imports every static file found under `dir` for `dataset`, then records a
/// [`EventType::GtfsDatabaseUpdated`] event.
///
/// Per-file errors become `Skipped`/`Failed` report entries and never abort
/// the remaining files. Store failures are systemic: they propagate and no
/// report or event is produced.
pub async fn run_static_import(
    dir: &Path,
    dataset: &str,
    store: &mut dyn StaticStore,
    sink: &mut dyn EventSink,
) -> Result<ImportRunReport> {
    if !dir.is_dir() {
        return Err(ImportError::DirectoryNotFound(dir.to_path_buf()).into());
    }

    info!(dir = %dir.display(), dataset, "starting static import run");
    let run_start = Instant::now();
    let mut files = Vec::with_capacity(FileKind::IMPORT_ORDER.len());

    for kind in FileKind::IMPORT_ORDER {
        let outcome = import_one_file(dir, kind, dataset, store)?;
        match &outcome {
            FileOutcome::Skipped { reason } => {
                warn!(file = kind.file_name(), reason, "file skipped")
            }
            FileOutcome::Failed { reason } => {
                error!(file = kind.file_name(), reason, "file failed")
            }
            FileOutcome::Completed {
                row_count,
                time_taken_s,
            } => {
                info!(
                    file = kind.file_name(),
                    rows = row_count,
                    elapsed_s = time_taken_s,
                    "file imported"
                )
            }
        }
        files.push(ImportFileReport { kind, outcome });
    }

    let report = ImportRunReport {
        dataset: dataset.to_string(),
        files,
        total_time_taken_s: round2(run_start.elapsed().as_secs_f64()),
    };

    sink.record(
        EventType::GtfsDatabaseUpdated,
        "GTFS static data updated with latest schedules",
        report.attributes(),
    )
    .await?;

    info!(
        elapsed_s = report.total_time_taken_s,
        "static import run finished"
    );
    Ok(report)
}

/// One `Pending → Skipped | Failed | Completed` transition. Returns `Err`
/// only for store failures, which abort the whole run.
fn import_one_file(
    dir: &Path,
    kind: FileKind,
    dataset: &str,
    store: &mut dyn StaticStore,
) -> Result<FileOutcome, ImportError> {
    if !dir.join(kind.file_name()).is_file() {
        return Ok(FileOutcome::Skipped {
            reason: format!("File '{}' does not exist.", kind.file_name()),
        });
    }

    let file_start = Instant::now();

    let reader = match open_reader(dir, kind) {
        Ok(reader) => reader,
        Err(e) => return Ok(FileOutcome::Failed { reason: e.to_string() }),
    };
    let row_count = match reader.row_count() {
        Ok(count) => count,
        Err(e) => return Ok(FileOutcome::Failed { reason: e.to_string() }),
    };

    let importer = match get_importer_for_file(kind.file_name(), reader, row_count, dataset) {
        Ok(importer) => importer,
        Err(ImportError::UnsupportedFileType(name)) => {
            return Ok(FileOutcome::Skipped {
                reason: format!("File '{name}' does not have a supported importer."),
            });
        }
        Err(e) => return Ok(FileOutcome::Failed { reason: e.to_string() }),
    };

    info!(importer = %importer, rows = row_count, "loaded importer");

    // Clear and insert form one logical step for this file.
    let result = importer
        .clear_table(store)
        .and_then(|_| importer.import_data(store));
    match result {
        Ok(inserted) => Ok(FileOutcome::Completed {
            row_count: inserted,
            time_taken_s: round2(file_start.elapsed().as_secs_f64()),
        }),
        Err(ImportError::Store(e)) => Err(ImportError::Store(e)),
        Err(e) => Ok(FileOutcome::Failed { reason: e.to_string() }),
    }
}

/// One realtime fetch-decode-persist cycle, recording a
/// [`EventType::RealtimeDatabaseUpdated`] event on success.
///
/// Returns `Ok(None)` when the feed yields no data this cycle; in that case
/// no table is touched and no event is recorded.
pub async fn run_realtime_import<C: HttpClient>(
    importer: &RealTimeImporter<C>,
    store: &mut dyn RealtimeStore,
    sink: &mut dyn EventSink,
) -> Result<Option<RealtimeRunReport>> {
    let run_start = Instant::now();

    let Some(feed) = importer.get_data().await else {
        warn!("no realtime data this cycle");
        return Ok(None);
    };
    info!(entities = feed.entity.len(), "realtime feed decoded");

    importer.clear_table_stop_trip(store)?;
    let total_stop_times = importer.import_stop_times(&feed, store)?;
    let total_trips = importer.import_trips(&feed, store)?;

    let report = RealtimeRunReport {
        dataset: importer.dataset().to_string(),
        total_trips,
        total_stop_times,
        time_taken_s: round2(run_start.elapsed().as_secs_f64()),
    };

    sink.record(
        EventType::RealtimeDatabaseUpdated,
        "Realtime database updated with new realtime information",
        report.attributes(),
    )
    .await?;

    info!(
        trips = total_trips,
        stop_times = total_stop_times,
        elapsed_s = report.time_taken_s,
        "realtime import finished"
    );
    Ok(Some(report))
}

fn round2(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}
