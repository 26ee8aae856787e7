//! Per-file static importers.
//!
//! One [`StaticImporter`] handles exactly one file of one run: it owns the
//! validated reader, converts every row to its typed record, and performs the
//! clear-then-bulk-insert pair against the store. Conversion happens in full
//! before any insert, so a bad row fails the file while the store has seen at
//! most the clear.

use std::fmt;

use tracing::debug;

use crate::error::{ImportError, RowError};
use crate::model::{Agency, Calendar, CalendarDate, Route, Shape, Stop, StopTime, Trip};
use crate::reader::{RawRow, RowReader};
use crate::registry::FileKind;
use crate::store::{StaticBatch, StaticStore};

#[derive(Debug)]
pub struct StaticImporter {
    kind: FileKind,
    reader: RowReader,
    row_count: usize,
    dataset: String,
}

impl StaticImporter {
    pub fn new(kind: FileKind, reader: RowReader, row_count: usize, dataset: &str) -> Self {
        Self {
            kind,
            reader,
            row_count,
            dataset: dataset.to_string(),
        }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Truncates the target table for every dataset. Destructive; the caller
    /// runs this immediately before [`Self::import_data`] as one logical step.
    pub fn clear_table(&self, store: &mut dyn StaticStore) -> Result<(), ImportError> {
        store.clear(self.kind)?;
        Ok(())
    }

    /// Converts the full row sequence and bulk-inserts it in one batch.
    ///
    /// The first row that fails conversion fails the whole file with
    /// [`ImportError::RowConversion`]; no records reach the store in that
    /// case. Returns the number of records inserted.
    pub fn import_data(mut self, store: &mut dyn StaticStore) -> Result<usize, ImportError> {
        let batch = self.convert_all()?;
        let inserted = batch.len();
        store.insert(batch)?;
        debug!(file = self.kind.file_name(), inserted, "bulk insert complete");
        Ok(inserted)
    }

    fn convert_all(&mut self) -> Result<StaticBatch, ImportError> {
        let kind = self.kind;
        let dataset = self.dataset.clone();
        let capacity = self.row_count;

        Ok(match kind {
            FileKind::Agency => {
                StaticBatch::Agencies(convert(self, capacity, &dataset, Agency::from_row)?)
            }
            FileKind::Calendar => {
                StaticBatch::Calendars(convert(self, capacity, &dataset, Calendar::from_row)?)
            }
            FileKind::CalendarDates => StaticBatch::CalendarDates(convert(
                self,
                capacity,
                &dataset,
                CalendarDate::from_row,
            )?),
            FileKind::Routes => {
                StaticBatch::Routes(convert(self, capacity, &dataset, Route::from_row)?)
            }
            FileKind::Stops => {
                StaticBatch::Stops(convert(self, capacity, &dataset, Stop::from_row)?)
            }
            FileKind::Trips => {
                StaticBatch::Trips(convert(self, capacity, &dataset, Trip::from_row)?)
            }
            FileKind::StopTimes => {
                StaticBatch::StopTimes(convert(self, capacity, &dataset, StopTime::from_row)?)
            }
            FileKind::Shapes => {
                StaticBatch::Shapes(convert(self, capacity, &dataset, Shape::from_row)?)
            }
        })
    }
}

fn convert<T>(
    importer: &mut StaticImporter,
    capacity: usize,
    dataset: &str,
    from_row: impl Fn(&RawRow, &str) -> Result<T, RowError>,
) -> Result<Vec<T>, ImportError> {
    let file = importer.kind.file_name();
    let mut out = Vec::with_capacity(capacity);
    for row in importer.reader.rows() {
        let row = row?;
        let position = row.position();
        let record =
            from_row(&row, dataset).map_err(|e| ImportError::row_conversion(file, position, e))?;
        out.push(record);
    }
    Ok(out)
}

impl fmt::Display for StaticImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            FileKind::Agency => "AgencyImporter",
            FileKind::Calendar => "CalendarImporter",
            FileKind::CalendarDates => "CalendarDateImporter",
            FileKind::Routes => "RouteImporter",
            FileKind::Stops => "StopImporter",
            FileKind::Trips => "TripImporter",
            FileKind::StopTimes => "StopTimeImporter",
            FileKind::Shapes => "ShapeImporter",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn importer_for(path: &PathBuf, kind: FileKind) -> StaticImporter {
        let reader = RowReader::open(path, kind.expected_header()).unwrap();
        let row_count = reader.row_count().unwrap();
        StaticImporter::new(kind, reader, row_count, "TFI")
    }

    #[test]
    fn test_import_inserts_all_rows() {
        let path = write_file(
            "gtfs_ingest_importer_ok.txt",
            "agency_id,agency_name,agency_url,agency_timezone\n\
             7778,Dublin Bus,https://dublinbus.ie,Europe/Dublin\n\
             7779,Go-Ahead,https://goaheadireland.ie,Europe/Dublin\n",
        );
        let importer = importer_for(&path, FileKind::Agency);
        let mut store = MemoryStore::new();

        importer.clear_table(&mut store).unwrap();
        let inserted = importer.import_data(&mut store).unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(store.agencies.len(), 2);
        assert_eq!(store.agencies[1].agency_id, "7779");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_row_fails_whole_file_without_partial_insert() {
        let path = write_file(
            "gtfs_ingest_importer_bad.txt",
            "route_id,service_id,trip_id,trip_headsign,trip_short_name,direction_id,block_id,shape_id\n\
             r1,s1,t1,A,,0,,\n\
             r1,s1,t2,B,,7,,\n\
             r1,s1,t3,C,,1,,\n",
        );
        let importer = importer_for(&path, FileKind::Trips);
        let mut store = MemoryStore::new();

        importer.clear_table(&mut store).unwrap();
        let err = importer.import_data(&mut store).unwrap_err();

        match err {
            ImportError::RowConversion { row, column, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "direction_id");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Whole-file atomicity: the valid first row was not persisted.
        assert!(store.trips.is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let contents = "agency_id,agency_name,agency_url,agency_timezone\n\
                        7778,Dublin Bus,https://dublinbus.ie,Europe/Dublin\n";
        let path = write_file("gtfs_ingest_importer_idem.txt", contents);
        let mut store = MemoryStore::new();

        for _ in 0..2 {
            let importer = importer_for(&path, FileKind::Agency);
            importer.clear_table(&mut store).unwrap();
            importer.import_data(&mut store).unwrap();
        }

        assert_eq!(store.agencies.len(), 1);
        std::fs::remove_file(&path).unwrap();
    }
}
