//! Typed GTFS domain records.
//!
//! Every record carries the dataset tag it was imported under. The
//! `from_row` constructors are the only way static records are built from
//! file data: they enforce the GTFS value domains (route type, direction id,
//! pickup/drop-off codes, ...) and reject out-of-domain values instead of
//! clamping them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RowError;
use crate::reader::RawRow;

/// Declares a closed integer-coded GTFS enum with serde round-tripping
/// through its wire value.
macro_rules! gtfs_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(into = "u8", try_from = "u8")]
        pub enum $name {
            $($variant = $value),+
        }

        impl From<$name> for u8 {
            fn from(v: $name) -> u8 {
                v as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(v: u8) -> Result<Self, Self::Error> {
                match v {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!(
                        "{} is not a valid {}",
                        other,
                        stringify!($name)
                    )),
                }
            }
        }
    };
}

gtfs_enum! {
    /// GTFS `route_type` — the documented integer set, extended route types
    /// excluded because the source feeds never emit them.
    RouteType {
        Tram = 0,
        Subway = 1,
        Rail = 2,
        Bus = 3,
        Ferry = 4,
        CableTram = 5,
        AerialLift = 6,
        Funicular = 7,
        Trolleybus = 11,
        Monorail = 12,
    }
}

gtfs_enum! {
    DirectionId {
        Outbound = 0,
        Inbound = 1,
    }
}

gtfs_enum! {
    /// `location_type` on stops; empty fields default to `StopOrPlatform`.
    LocationType {
        StopOrPlatform = 0,
        Station = 1,
        EntranceExit = 2,
        GenericNode = 3,
        BoardingArea = 4,
    }
}

gtfs_enum! {
    /// `pickup_type` / `drop_off_type`; empty fields default to `Regular`.
    PickupDropOff {
        Regular = 0,
        NotAvailable = 1,
        PhoneAgency = 2,
        CoordinateWithDriver = 3,
    }
}

gtfs_enum! {
    /// `exception_type` in calendar_dates.
    ExceptionType {
        Added = 1,
        Removed = 2,
    }
}

gtfs_enum! {
    /// Weekday service flag in calendar.
    ServiceDay {
        NoService = 0,
        Service = 1,
    }
}

gtfs_enum! {
    /// `timepoint` on stop times; empty fields default to `Exact`.
    Timepoint {
        Approximate = 0,
        Exact = 1,
    }
}

// Field-access helpers shared by all from_row constructors.

fn required<'a>(row: &'a RawRow, column: &str) -> Result<&'a str, RowError> {
    match row.get(column) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(RowError::new(column, "required field is empty")),
        None => Err(RowError::new(column, "column missing from row")),
    }
}

fn optional(row: &RawRow, column: &str) -> Option<String> {
    row.get(column)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn coordinate(row: &RawRow, column: &str) -> Result<f64, RowError> {
    required(row, column)?
        .parse::<f64>()
        .map_err(|e| RowError::new(column, format!("not a number: {e}")))
}

fn sequence(row: &RawRow, column: &str) -> Result<u32, RowError> {
    required(row, column)?
        .parse::<u32>()
        .map_err(|e| RowError::new(column, format!("not a non-negative integer: {e}")))
}

fn date(row: &RawRow, column: &str) -> Result<NaiveDate, RowError> {
    let raw = required(row, column)?;
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map_err(|_| RowError::new(column, format!("'{raw}' is not a YYYYMMDD date")))
}

/// Parses an integer-coded enum field. `default` applies when the field is
/// empty or absent; without one, an empty field is an error.
fn coded<T>(row: &RawRow, column: &str, default: Option<T>) -> Result<T, RowError>
where
    T: TryFrom<u8, Error = String>,
{
    let raw = row.get(column).unwrap_or("");
    if raw.is_empty() {
        return default.ok_or_else(|| RowError::new(column, "required field is empty"));
    }
    let code: u8 = raw
        .parse()
        .map_err(|_| RowError::new(column, format!("'{raw}' is not an integer code")))?;
    T::try_from(code).map_err(|e| RowError::new(column, e))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub dataset: String,
    pub agency_id: String,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
}

impl Agency {
    pub const HEADER: &'static [&'static str] =
        &["agency_id", "agency_name", "agency_url", "agency_timezone"];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        Ok(Self {
            dataset: dataset.to_string(),
            agency_id: required(row, "agency_id")?.to_string(),
            agency_name: required(row, "agency_name")?.to_string(),
            agency_url: required(row, "agency_url")?.to_string(),
            agency_timezone: required(row, "agency_timezone")?.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub dataset: String,
    pub service_id: String,
    pub monday: ServiceDay,
    pub tuesday: ServiceDay,
    pub wednesday: ServiceDay,
    pub thursday: ServiceDay,
    pub friday: ServiceDay,
    pub saturday: ServiceDay,
    pub sunday: ServiceDay,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Calendar {
    pub const HEADER: &'static [&'static str] = &[
        "service_id",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
        "start_date",
        "end_date",
    ];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        Ok(Self {
            dataset: dataset.to_string(),
            service_id: required(row, "service_id")?.to_string(),
            monday: coded(row, "monday", None)?,
            tuesday: coded(row, "tuesday", None)?,
            wednesday: coded(row, "wednesday", None)?,
            thursday: coded(row, "thursday", None)?,
            friday: coded(row, "friday", None)?,
            saturday: coded(row, "saturday", None)?,
            sunday: coded(row, "sunday", None)?,
            start_date: date(row, "start_date")?,
            end_date: date(row, "end_date")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub dataset: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub exception_type: ExceptionType,
}

impl CalendarDate {
    pub const HEADER: &'static [&'static str] = &["service_id", "date", "exception_type"];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        Ok(Self {
            dataset: dataset.to_string(),
            service_id: required(row, "service_id")?.to_string(),
            date: date(row, "date")?,
            exception_type: coded(row, "exception_type", None)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub dataset: String,
    pub route_id: String,
    pub agency_id: String,
    pub route_short_name: String,
    pub route_long_name: String,
    pub route_desc: Option<String>,
    pub route_type: RouteType,
}

impl Route {
    pub const HEADER: &'static [&'static str] = &[
        "route_id",
        "agency_id",
        "route_short_name",
        "route_long_name",
        "route_desc",
        "route_type",
    ];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        Ok(Self {
            dataset: dataset.to_string(),
            route_id: required(row, "route_id")?.to_string(),
            agency_id: required(row, "agency_id")?.to_string(),
            route_short_name: required(row, "route_short_name")?.to_string(),
            route_long_name: required(row, "route_long_name")?.to_string(),
            route_desc: optional(row, "route_desc"),
            route_type: coded(row, "route_type", None)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub dataset: String,
    pub stop_id: String,
    pub stop_code: Option<String>,
    pub stop_name: String,
    pub stop_desc: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub zone_id: Option<String>,
    pub stop_url: Option<String>,
    pub location_type: LocationType,
    pub parent_station: Option<String>,
}

impl Stop {
    pub const HEADER: &'static [&'static str] = &[
        "stop_id",
        "stop_code",
        "stop_name",
        "stop_desc",
        "stop_lat",
        "stop_lon",
        "zone_id",
        "stop_url",
        "location_type",
        "parent_station",
    ];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        Ok(Self {
            dataset: dataset.to_string(),
            stop_id: required(row, "stop_id")?.to_string(),
            stop_code: optional(row, "stop_code"),
            stop_name: required(row, "stop_name")?.to_string(),
            stop_desc: optional(row, "stop_desc"),
            stop_lat: coordinate(row, "stop_lat")?,
            stop_lon: coordinate(row, "stop_lon")?,
            zone_id: optional(row, "zone_id"),
            stop_url: optional(row, "stop_url"),
            location_type: coded(row, "location_type", Some(LocationType::StopOrPlatform))?,
            parent_station: optional(row, "parent_station"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub dataset: String,
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    pub trip_headsign: Option<String>,
    pub trip_short_name: Option<String>,
    pub direction_id: DirectionId,
    pub block_id: Option<String>,
    pub shape_id: Option<String>,
}

impl Trip {
    pub const HEADER: &'static [&'static str] = &[
        "route_id",
        "service_id",
        "trip_id",
        "trip_headsign",
        "trip_short_name",
        "direction_id",
        "block_id",
        "shape_id",
    ];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        Ok(Self {
            dataset: dataset.to_string(),
            route_id: required(row, "route_id")?.to_string(),
            service_id: required(row, "service_id")?.to_string(),
            trip_id: required(row, "trip_id")?.to_string(),
            trip_headsign: optional(row, "trip_headsign"),
            trip_short_name: optional(row, "trip_short_name"),
            direction_id: coded(row, "direction_id", None)?,
            block_id: optional(row, "block_id"),
            shape_id: optional(row, "shape_id"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub dataset: String,
    pub trip_id: String,
    /// GTFS times may exceed 24:00:00 for after-midnight service, so these
    /// stay in their HH:MM:SS text form.
    pub arrival_time: String,
    pub departure_time: String,
    pub stop_id: String,
    pub stop_sequence: u32,
    pub stop_headsign: Option<String>,
    pub pickup_type: PickupDropOff,
    pub drop_off_type: PickupDropOff,
    pub timepoint: Timepoint,
}

impl StopTime {
    pub const HEADER: &'static [&'static str] = &[
        "trip_id",
        "arrival_time",
        "departure_time",
        "stop_id",
        "stop_sequence",
        "stop_headsign",
        "pickup_type",
        "drop_off_type",
        "timepoint",
    ];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        Ok(Self {
            dataset: dataset.to_string(),
            trip_id: required(row, "trip_id")?.to_string(),
            arrival_time: required(row, "arrival_time")?.to_string(),
            departure_time: required(row, "departure_time")?.to_string(),
            stop_id: required(row, "stop_id")?.to_string(),
            stop_sequence: sequence(row, "stop_sequence")?,
            stop_headsign: optional(row, "stop_headsign"),
            pickup_type: coded(row, "pickup_type", Some(PickupDropOff::Regular))?,
            drop_off_type: coded(row, "drop_off_type", Some(PickupDropOff::Regular))?,
            timepoint: coded(row, "timepoint", Some(Timepoint::Exact))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub dataset: String,
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
    pub shape_dist_traveled: Option<f64>,
}

impl Shape {
    pub const HEADER: &'static [&'static str] = &[
        "shape_id",
        "shape_pt_lat",
        "shape_pt_lon",
        "shape_pt_sequence",
        "shape_dist_traveled",
    ];

    pub fn from_row(row: &RawRow, dataset: &str) -> Result<Self, RowError> {
        let dist = match optional(row, "shape_dist_traveled") {
            Some(raw) => Some(raw.parse::<f64>().map_err(|e| {
                RowError::new("shape_dist_traveled", format!("not a number: {e}"))
            })?),
            None => None,
        };
        Ok(Self {
            dataset: dataset.to_string(),
            shape_id: required(row, "shape_id")?.to_string(),
            shape_pt_lat: coordinate(row, "shape_pt_lat")?,
            shape_pt_lon: coordinate(row, "shape_pt_lon")?,
            shape_pt_sequence: sequence(row, "shape_pt_sequence")?,
            shape_dist_traveled: dist,
        })
    }
}

/// Realtime trip projection, derived from a trip-update feed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtTrip {
    pub dataset: String,
    pub trip_id: String,
    pub route_id: Option<String>,
    pub direction_id: Option<u32>,
    pub start_time: Option<String>,
    pub start_date: Option<String>,
    pub schedule_relationship: String,
}

/// Realtime stop-time projection, one per nested stop-time update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtStopTime {
    pub dataset: String,
    pub trip_id: String,
    pub stop_id: Option<String>,
    pub stop_sequence: Option<u32>,
    pub schedule_relationship: String,
    pub arrival_delay: Option<i32>,
    pub departure_delay: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RowReader;
    use std::io::Write;

    fn rows_from(name: &str, contents: &str, header: &[&str]) -> Vec<RawRow> {
        let path = std::env::temp_dir().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        let mut reader = RowReader::open(&path, header).unwrap();
        let rows = reader.rows().collect::<Result<_, _>>().unwrap();
        std::fs::remove_file(&path).unwrap();
        rows
    }

    #[test]
    fn test_agency_from_row() {
        let rows = rows_from(
            "gtfs_ingest_model_agency.txt",
            "agency_id,agency_name,agency_url,agency_timezone\n\
             7778,Dublin Bus,https://dublinbus.ie,Europe/Dublin\n",
            Agency::HEADER,
        );
        let agency = Agency::from_row(&rows[0], "TFI").unwrap();
        assert_eq!(agency.agency_name, "Dublin Bus");
        assert_eq!(agency.dataset, "TFI");
    }

    #[test]
    fn test_route_type_out_of_domain_rejected() {
        let rows = rows_from(
            "gtfs_ingest_model_route.txt",
            "route_id,agency_id,route_short_name,route_long_name,route_desc,route_type\n\
             r1,7778,46A,Phoenix Park,,9\n",
            Route::HEADER,
        );
        let err = Route::from_row(&rows[0], "TFI").unwrap_err();
        assert_eq!(err.column, "route_type");
    }

    #[test]
    fn test_direction_id_out_of_domain_rejected() {
        let rows = rows_from(
            "gtfs_ingest_model_trip.txt",
            "route_id,service_id,trip_id,trip_headsign,trip_short_name,direction_id,block_id,shape_id\n\
             r1,s1,t1,City Centre,,7,,\n",
            Trip::HEADER,
        );
        let err = Trip::from_row(&rows[0], "TFI").unwrap_err();
        assert_eq!(err.column, "direction_id");
    }

    #[test]
    fn test_stop_time_defaults_apply_to_empty_fields() {
        let rows = rows_from(
            "gtfs_ingest_model_stoptime.txt",
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence,stop_headsign,pickup_type,drop_off_type,timepoint\n\
             t1,25:10:00,25:11:00,s1,4,,,,\n",
            StopTime::HEADER,
        );
        let st = StopTime::from_row(&rows[0], "TFI").unwrap();
        assert_eq!(st.pickup_type, PickupDropOff::Regular);
        assert_eq!(st.timepoint, Timepoint::Exact);
        assert_eq!(st.arrival_time, "25:10:00");
        assert_eq!(st.stop_sequence, 4);
    }

    #[test]
    fn test_calendar_dates_parse() {
        let rows = rows_from(
            "gtfs_ingest_model_caldate.txt",
            "service_id,date,exception_type\ns1,20240317,2\n",
            CalendarDate::HEADER,
        );
        let cd = CalendarDate::from_row(&rows[0], "TFI").unwrap();
        assert_eq!(cd.date, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap());
        assert_eq!(cd.exception_type, ExceptionType::Removed);
    }

    #[test]
    fn test_calendar_bad_date_rejected() {
        let rows = rows_from(
            "gtfs_ingest_model_baddate.txt",
            "service_id,date,exception_type\ns1,2024-03-17,1\n",
            CalendarDate::HEADER,
        );
        let err = CalendarDate::from_row(&rows[0], "TFI").unwrap_err();
        assert_eq!(err.column, "date");
    }

    #[test]
    fn test_required_field_empty_rejected() {
        let rows = rows_from(
            "gtfs_ingest_model_emptyreq.txt",
            "agency_id,agency_name,agency_url,agency_timezone\n7778,,x,y\n",
            Agency::HEADER,
        );
        let err = Agency::from_row(&rows[0], "TFI").unwrap_err();
        assert_eq!(err.column, "agency_name");
    }
}
