//! Static-file dispatch.
//!
//! The eight supported GTFS flat files form a closed set, so dispatch is a
//! lookup over [`FileKind`] rather than anything dynamic. Unknown filenames
//! are an [`ImportError::UnsupportedFileType`], which callers are expected to
//! recover from by skipping the file.

use std::path::Path;

use crate::error::ImportError;
use crate::importer::StaticImporter;
use crate::model::{Agency, Calendar, CalendarDate, Route, Shape, Stop, StopTime, Trip};
use crate::reader::RowReader;

/// The eight static GTFS files this pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Agency,
    Calendar,
    CalendarDates,
    Routes,
    Stops,
    Trips,
    StopTimes,
    Shapes,
}

impl FileKind {
    /// Import order: reference targets load before the files that point at
    /// them. Referential integrity is not enforced, but this ordering biases
    /// toward it.
    pub const IMPORT_ORDER: [FileKind; 8] = [
        FileKind::Agency,
        FileKind::Calendar,
        FileKind::CalendarDates,
        FileKind::Routes,
        FileKind::Stops,
        FileKind::Trips,
        FileKind::StopTimes,
        FileKind::Shapes,
    ];

    /// Exact filename match against the supported set.
    pub fn from_filename(name: &str) -> Option<Self> {
        match name {
            "agency.txt" => Some(FileKind::Agency),
            "calendar.txt" => Some(FileKind::Calendar),
            "calendar_dates.txt" => Some(FileKind::CalendarDates),
            "routes.txt" => Some(FileKind::Routes),
            "stops.txt" => Some(FileKind::Stops),
            "trips.txt" => Some(FileKind::Trips),
            "stop_times.txt" => Some(FileKind::StopTimes),
            "shapes.txt" => Some(FileKind::Shapes),
            _ => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            FileKind::Agency => "agency.txt",
            FileKind::Calendar => "calendar.txt",
            FileKind::CalendarDates => "calendar_dates.txt",
            FileKind::Routes => "routes.txt",
            FileKind::Stops => "stops.txt",
            FileKind::Trips => "trips.txt",
            FileKind::StopTimes => "stop_times.txt",
            FileKind::Shapes => "shapes.txt",
        }
    }

    /// Filename without the `.txt` suffix, used as the report key.
    pub fn base_name(&self) -> &'static str {
        match self {
            FileKind::Agency => "agency",
            FileKind::Calendar => "calendar",
            FileKind::CalendarDates => "calendar_dates",
            FileKind::Routes => "routes",
            FileKind::Stops => "stops",
            FileKind::Trips => "trips",
            FileKind::StopTimes => "stop_times",
            FileKind::Shapes => "shapes",
        }
    }

    /// Expected header columns, in order, for this file.
    pub fn expected_header(&self) -> &'static [&'static str] {
        match self {
            FileKind::Agency => Agency::HEADER,
            FileKind::Calendar => Calendar::HEADER,
            FileKind::CalendarDates => CalendarDate::HEADER,
            FileKind::Routes => Route::HEADER,
            FileKind::Stops => Stop::HEADER,
            FileKind::Trips => Trip::HEADER,
            FileKind::StopTimes => StopTime::HEADER,
            FileKind::Shapes => Shape::HEADER,
        }
    }
}

/// Opens a validated reader for `kind` inside `dir`.
pub fn open_reader(dir: &Path, kind: FileKind) -> Result<RowReader, ImportError> {
    RowReader::open(&dir.join(kind.file_name()), kind.expected_header())
}

/// Resolves `filename` to its importer, bound to `reader` and `dataset`.
///
/// Fails with [`ImportError::UnsupportedFileType`] for filenames outside the
/// supported set; the caller should skip the file and continue.
pub fn get_importer_for_file(
    filename: &str,
    reader: RowReader,
    row_count: usize,
    dataset: &str,
) -> Result<StaticImporter, ImportError> {
    let kind = FileKind::from_filename(filename)
        .ok_or_else(|| ImportError::UnsupportedFileType(filename.to_string()))?;
    Ok(StaticImporter::new(kind, reader, row_count, dataset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_all_supported_filenames_resolve() {
        for kind in FileKind::IMPORT_ORDER {
            assert_eq!(FileKind::from_filename(kind.file_name()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_filename_is_unsupported() {
        assert_eq!(FileKind::from_filename("transfers.txt"), None);

        let path = std::env::temp_dir().join("gtfs_ingest_registry_unknown.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"a,b\n1,2\n").unwrap();
        let reader = RowReader::open(&path, &["a", "b"]).unwrap();

        let err = get_importer_for_file("transfers.txt", reader, 1, "TFI").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFileType(_)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_import_order_is_stable() {
        let names: Vec<_> = FileKind::IMPORT_ORDER
            .iter()
            .map(|k| k.file_name())
            .collect();
        assert_eq!(
            names,
            [
                "agency.txt",
                "calendar.txt",
                "calendar_dates.txt",
                "routes.txt",
                "stops.txt",
                "trips.txt",
                "stop_times.txt",
                "shapes.txt",
            ]
        );
    }
}
