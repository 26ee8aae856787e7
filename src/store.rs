//! Persistence contracts and the backends shipped with the crate.
//!
//! The pipeline only needs two operations per table: a table-wide truncate
//! and a bulk insert of one file's worth of records. Real deployments put a
//! relational store behind these traits; the crate ships [`MemoryStore`] for
//! tests and embedders and [`CsvStore`] for the CLI binary.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{
    Agency, Calendar, CalendarDate, Route, RtStopTime, RtTrip, Shape, Stop, StopTime, Trip,
};
use crate::registry::FileKind;

/// One file's fully converted records, ready for a single bulk insert.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticBatch {
    Agencies(Vec<Agency>),
    Calendars(Vec<Calendar>),
    CalendarDates(Vec<CalendarDate>),
    Routes(Vec<Route>),
    Stops(Vec<Stop>),
    Trips(Vec<Trip>),
    StopTimes(Vec<StopTime>),
    Shapes(Vec<Shape>),
}

impl StaticBatch {
    pub fn kind(&self) -> FileKind {
        match self {
            StaticBatch::Agencies(_) => FileKind::Agency,
            StaticBatch::Calendars(_) => FileKind::Calendar,
            StaticBatch::CalendarDates(_) => FileKind::CalendarDates,
            StaticBatch::Routes(_) => FileKind::Routes,
            StaticBatch::Stops(_) => FileKind::Stops,
            StaticBatch::Trips(_) => FileKind::Trips,
            StaticBatch::StopTimes(_) => FileKind::StopTimes,
            StaticBatch::Shapes(_) => FileKind::Shapes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StaticBatch::Agencies(v) => v.len(),
            StaticBatch::Calendars(v) => v.len(),
            StaticBatch::CalendarDates(v) => v.len(),
            StaticBatch::Routes(v) => v.len(),
            StaticBatch::Stops(v) => v.len(),
            StaticBatch::Trips(v) => v.len(),
            StaticBatch::StopTimes(v) => v.len(),
            StaticBatch::Shapes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Persistence for the eight static tables.
///
/// `clear` truncates the whole table across every dataset; `insert` is one
/// bulk write. The pipeline always calls them as a clear-then-insert pair per
/// file and relies on the backend for whatever atomicity it can give between
/// the two.
pub trait StaticStore {
    fn clear(&mut self, kind: FileKind) -> Result<(), StoreError>;
    fn insert(&mut self, batch: StaticBatch) -> Result<(), StoreError>;
}

/// Persistence for the realtime snapshot tables. Both tables are always
/// truncated together before repopulation.
pub trait RealtimeStore {
    fn clear_realtime(&mut self) -> Result<(), StoreError>;
    fn insert_rt_trips(&mut self, rows: Vec<RtTrip>) -> Result<(), StoreError>;
    fn insert_rt_stop_times(&mut self, rows: Vec<RtStopTime>) -> Result<(), StoreError>;
}

/// In-memory backend. Insert after a successful conversion of every row is
/// all-or-nothing, so clear-then-insert behaves atomically here.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub agencies: Vec<Agency>,
    pub calendars: Vec<Calendar>,
    pub calendar_dates: Vec<CalendarDate>,
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
    pub shapes: Vec<Shape>,
    pub rt_trips: Vec<RtTrip>,
    pub rt_stop_times: Vec<RtStopTime>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row count of the static table backing `kind`.
    pub fn table_len(&self, kind: FileKind) -> usize {
        match kind {
            FileKind::Agency => self.agencies.len(),
            FileKind::Calendar => self.calendars.len(),
            FileKind::CalendarDates => self.calendar_dates.len(),
            FileKind::Routes => self.routes.len(),
            FileKind::Stops => self.stops.len(),
            FileKind::Trips => self.trips.len(),
            FileKind::StopTimes => self.stop_times.len(),
            FileKind::Shapes => self.shapes.len(),
        }
    }
}

impl StaticStore for MemoryStore {
    fn clear(&mut self, kind: FileKind) -> Result<(), StoreError> {
        match kind {
            FileKind::Agency => self.agencies.clear(),
            FileKind::Calendar => self.calendars.clear(),
            FileKind::CalendarDates => self.calendar_dates.clear(),
            FileKind::Routes => self.routes.clear(),
            FileKind::Stops => self.stops.clear(),
            FileKind::Trips => self.trips.clear(),
            FileKind::StopTimes => self.stop_times.clear(),
            FileKind::Shapes => self.shapes.clear(),
        }
        Ok(())
    }

    fn insert(&mut self, batch: StaticBatch) -> Result<(), StoreError> {
        match batch {
            StaticBatch::Agencies(mut v) => self.agencies.append(&mut v),
            StaticBatch::Calendars(mut v) => self.calendars.append(&mut v),
            StaticBatch::CalendarDates(mut v) => self.calendar_dates.append(&mut v),
            StaticBatch::Routes(mut v) => self.routes.append(&mut v),
            StaticBatch::Stops(mut v) => self.stops.append(&mut v),
            StaticBatch::Trips(mut v) => self.trips.append(&mut v),
            StaticBatch::StopTimes(mut v) => self.stop_times.append(&mut v),
            StaticBatch::Shapes(mut v) => self.shapes.append(&mut v),
        }
        Ok(())
    }
}

impl RealtimeStore for MemoryStore {
    fn clear_realtime(&mut self) -> Result<(), StoreError> {
        self.rt_trips.clear();
        self.rt_stop_times.clear();
        Ok(())
    }

    fn insert_rt_trips(&mut self, mut rows: Vec<RtTrip>) -> Result<(), StoreError> {
        self.rt_trips.append(&mut rows);
        Ok(())
    }

    fn insert_rt_stop_times(&mut self, mut rows: Vec<RtStopTime>) -> Result<(), StoreError> {
        self.rt_stop_times.append(&mut rows);
        Ok(())
    }
}

/// Flat-file backend: one CSV file per table under a data directory.
///
/// Clear-then-insert atomicity is best-effort here; an interruption between
/// the two leaves the table file absent, never duplicated.
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }

    fn truncate(&self, table: &str) -> Result<(), StoreError> {
        let path = self.table_path(table);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        debug!(table, "table cleared");
        Ok(())
    }

    fn write_all<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), StoreError> {
        let path = self.table_path(table);
        let file_exists = path.exists();
        let file = OpenOptions::new().append(true).create(true).open(&path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        debug!(table, rows = rows.len(), "bulk insert written");
        Ok(())
    }
}

impl StaticStore for CsvStore {
    fn clear(&mut self, kind: FileKind) -> Result<(), StoreError> {
        self.truncate(kind.base_name())
    }

    fn insert(&mut self, batch: StaticBatch) -> Result<(), StoreError> {
        let table = batch.kind().base_name();
        match batch {
            StaticBatch::Agencies(v) => self.write_all(table, &v),
            StaticBatch::Calendars(v) => self.write_all(table, &v),
            StaticBatch::CalendarDates(v) => self.write_all(table, &v),
            StaticBatch::Routes(v) => self.write_all(table, &v),
            StaticBatch::Stops(v) => self.write_all(table, &v),
            StaticBatch::Trips(v) => self.write_all(table, &v),
            StaticBatch::StopTimes(v) => self.write_all(table, &v),
            StaticBatch::Shapes(v) => self.write_all(table, &v),
        }
    }
}

impl RealtimeStore for CsvStore {
    fn clear_realtime(&mut self) -> Result<(), StoreError> {
        self.truncate("rt_trip")?;
        self.truncate("rt_stop_time")
    }

    fn insert_rt_trips(&mut self, rows: Vec<RtTrip>) -> Result<(), StoreError> {
        self.write_all("rt_trip", &rows)
    }

    fn insert_rt_stop_times(&mut self, rows: Vec<RtStopTime>) -> Result<(), StoreError> {
        self.write_all("rt_stop_time", &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agency(dataset: &str, id: &str) -> Agency {
        Agency {
            dataset: dataset.to_string(),
            agency_id: id.to_string(),
            agency_name: "Dublin Bus".to_string(),
            agency_url: "https://dublinbus.ie".to_string(),
            agency_timezone: "Europe/Dublin".to_string(),
        }
    }

    #[test]
    fn test_memory_store_clear_then_insert_replaces() {
        let mut store = MemoryStore::new();
        store
            .insert(StaticBatch::Agencies(vec![agency("OLD", "1")]))
            .unwrap();

        store.clear(FileKind::Agency).unwrap();
        store
            .insert(StaticBatch::Agencies(vec![
                agency("TFI", "1"),
                agency("TFI", "2"),
            ]))
            .unwrap();

        assert_eq!(store.agencies.len(), 2);
        assert!(store.agencies.iter().all(|a| a.dataset == "TFI"));
    }

    #[test]
    fn test_memory_store_clear_realtime_empties_both_tables() {
        let mut store = MemoryStore::new();
        store
            .insert_rt_trips(vec![RtTrip {
                dataset: "TFI".to_string(),
                trip_id: "t1".to_string(),
                route_id: None,
                direction_id: None,
                start_time: None,
                start_date: None,
                schedule_relationship: "SCHEDULED".to_string(),
            }])
            .unwrap();
        store.clear_realtime().unwrap();
        assert!(store.rt_trips.is_empty());
        assert!(store.rt_stop_times.is_empty());
    }

    #[test]
    fn test_csv_store_writes_one_file_per_table() {
        let dir = std::env::temp_dir().join("gtfs_ingest_csvstore_test");
        let _ = std::fs::remove_dir_all(&dir);
        let mut store = CsvStore::open(&dir).unwrap();

        store.clear(FileKind::Agency).unwrap();
        store
            .insert(StaticBatch::Agencies(vec![agency("TFI", "7778")]))
            .unwrap();

        let contents = std::fs::read_to_string(dir.join("agency.csv")).unwrap();
        assert!(contents.starts_with("dataset,agency_id"));
        assert!(contents.contains("Dublin Bus"));

        // A second clear-then-insert fully replaces the file.
        store.clear(FileKind::Agency).unwrap();
        store
            .insert(StaticBatch::Agencies(vec![agency("TFI", "9999")]))
            .unwrap();
        let contents = std::fs::read_to_string(dir.join("agency.csv")).unwrap();
        assert!(!contents.contains("7778"));
        assert!(contents.contains("9999"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
