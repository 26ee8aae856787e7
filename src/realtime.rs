//! GTFS Realtime import.
//!
//! One fetch-decode-persist cycle: GET the configured feed URL, decode the
//! protobuf body, project entities into `RtTrip`/`RtStopTime` records and
//! replace both snapshot tables. Feeds are noisy, so malformed individual
//! entities are skipped and counted, never failed on.

use tracing::{debug, warn};

use crate::error::ImportError;
use crate::fetch::{ApiKey, BasicClient, HttpClient, fetch_bytes};
use crate::gtfs_rt::{FeedEntity, FeedMessage, TripUpdate};
use crate::model::{RtStopTime, RtTrip};
use crate::parser::parse_feed;
use crate::store::RealtimeStore;

/// Header most transit realtime endpoints use for API key auth.
const API_KEY_HEADER: &str = "x-api-key";

/// Explicit configuration for one realtime importer; defaults are resolved by
/// the caller, never read from process-wide state here.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub api_key: String,
    pub dataset: String,
}

pub struct RealTimeImporter<C = ApiKey<BasicClient>> {
    client: C,
    url: String,
    dataset: String,
}

impl RealTimeImporter {
    pub fn new(config: RealtimeConfig) -> Self {
        let client = ApiKey::new(BasicClient::new(), API_KEY_HEADER, &config.api_key);
        Self {
            client,
            url: config.url,
            dataset: config.dataset,
        }
    }
}

impl<C: HttpClient> RealTimeImporter<C> {
    /// Builds an importer over an arbitrary [`HttpClient`], used by tests.
    pub fn with_client(client: C, url: &str, dataset: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            dataset: dataset.to_string(),
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Fetches and decodes the feed.
    ///
    /// Returns `None` for a non-success HTTP status, a transport failure, or
    /// an undecodable body; the caller treats that as "no update this cycle."
    pub async fn get_data(&self) -> Option<FeedMessage> {
        let bytes = match fetch_bytes(&self.client, &self.url).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, url = %self.url, "realtime fetch failed");
                return None;
            }
        };

        match parse_feed(&bytes) {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!(error = %e, "realtime feed did not decode");
                None
            }
        }
    }

    /// Truncates both realtime tables. The snapshot is always fully replaced,
    /// never merged with the previous cycle's rows.
    pub fn clear_table_stop_trip(&self, store: &mut dyn RealtimeStore) -> Result<(), ImportError> {
        store.clear_realtime()?;
        Ok(())
    }

    /// Converts trip-update entities to [`RtTrip`] records and bulk-inserts
    /// them. Returns the number inserted.
    pub fn import_trips(
        &self,
        feed: &FeedMessage,
        store: &mut dyn RealtimeStore,
    ) -> Result<usize, ImportError> {
        let mut skipped = 0usize;
        let mut rows = Vec::new();

        for entity in &feed.entity {
            let Some(update) = &entity.trip_update else {
                continue;
            };
            match rt_trip_from_update(update, &self.dataset) {
                Some(trip) => rows.push(trip),
                None => {
                    skipped += 1;
                    warn!(entity_id = %entity.id, "trip update without trip_id skipped");
                }
            }
        }

        let inserted = rows.len();
        store.insert_rt_trips(rows)?;
        debug!(inserted, skipped, "realtime trips imported");
        Ok(inserted)
    }

    /// Flattens every trip update's nested stop-time updates into
    /// [`RtStopTime`] records and bulk-inserts them. Returns the number
    /// inserted.
    pub fn import_stop_times(
        &self,
        feed: &FeedMessage,
        store: &mut dyn RealtimeStore,
    ) -> Result<usize, ImportError> {
        let mut skipped = 0usize;
        let mut rows = Vec::new();

        for entity in &feed.entity {
            skipped += collect_rt_stop_times(entity, &self.dataset, &mut rows);
        }

        let inserted = rows.len();
        store.insert_rt_stop_times(rows)?;
        debug!(inserted, skipped, "realtime stop times imported");
        Ok(inserted)
    }
}

fn rt_trip_from_update(update: &TripUpdate, dataset: &str) -> Option<RtTrip> {
    let trip = &update.trip;
    let trip_id = trip.trip_id.as_deref().filter(|id| !id.is_empty())?;

    Some(RtTrip {
        dataset: dataset.to_string(),
        trip_id: trip_id.to_string(),
        route_id: trip.route_id.clone(),
        direction_id: trip.direction_id,
        start_time: trip.start_time.clone(),
        start_date: trip.start_date.clone(),
        schedule_relationship: trip.schedule_relationship().as_str_name().to_string(),
    })
}

/// Appends this entity's well-formed stop-time updates to `rows`, returning
/// how many were skipped as malformed.
fn collect_rt_stop_times(entity: &FeedEntity, dataset: &str, rows: &mut Vec<RtStopTime>) -> usize {
    let Some(update) = &entity.trip_update else {
        return 0;
    };
    let Some(trip_id) = update.trip.trip_id.as_deref().filter(|id| !id.is_empty()) else {
        if !update.stop_time_update.is_empty() {
            warn!(entity_id = %entity.id, "stop time updates without trip_id skipped");
        }
        return update.stop_time_update.len();
    };

    let mut skipped = 0;
    for stu in &update.stop_time_update {
        // A stop-time update must identify its stop one way or the other.
        if stu.stop_id.is_none() && stu.stop_sequence.is_none() {
            skipped += 1;
            warn!(entity_id = %entity.id, "stop time update without stop reference skipped");
            continue;
        }
        rows.push(RtStopTime {
            dataset: dataset.to_string(),
            trip_id: trip_id.to_string(),
            stop_id: stu.stop_id.clone(),
            stop_sequence: stu.stop_sequence,
            schedule_relationship: stu.schedule_relationship().as_str_name().to_string(),
            arrival_delay: stu.arrival.as_ref().and_then(|e| e.delay),
            departure_delay: stu.departure.as_ref().and_then(|e| e.delay),
        });
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
    use crate::gtfs_rt::{FeedHeader, TripDescriptor, VehiclePosition};
    use crate::store::MemoryStore;

    fn feed(entities: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: None,
                timestamp: Some(1700000000),
                feed_version: None,
            },
            entity: entities,
        }
    }

    fn trip_update_entity(id: &str, trip_id: Option<&str>, stops: Vec<StopTimeUpdate>) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            is_deleted: None,
            trip_update: Some(TripUpdate {
                trip: TripDescriptor {
                    trip_id: trip_id.map(str::to_string),
                    route_id: Some("r1".to_string()),
                    direction_id: Some(0),
                    start_time: Some("11:30:00".to_string()),
                    start_date: Some("20240317".to_string()),
                    schedule_relationship: Some(0),
                },
                vehicle: None,
                stop_time_update: stops,
                timestamp: None,
                delay: None,
            }),
            vehicle: None,
        }
    }

    fn vehicle_entity(id: &str) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            is_deleted: None,
            trip_update: None,
            vehicle: Some(VehiclePosition::default()),
        }
    }

    fn stop_update(stop_id: Option<&str>, seq: Option<u32>, delay: i32) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_sequence: seq,
            stop_id: stop_id.map(str::to_string),
            arrival: Some(StopTimeEvent {
                delay: Some(delay),
                time: None,
                uncertainty: None,
            }),
            departure: None,
            schedule_relationship: None,
        }
    }

    fn importer() -> RealTimeImporter<BasicClient> {
        RealTimeImporter::with_client(BasicClient::new(), "http://localhost/feed", "TFI")
    }

    #[test]
    fn test_import_trips_counts_only_trip_updates() {
        let feed = feed(vec![
            trip_update_entity("1", Some("t1"), vec![]),
            trip_update_entity("2", Some("t2"), vec![]),
            trip_update_entity("3", Some("t3"), vec![]),
            vehicle_entity("4"),
            vehicle_entity("5"),
        ]);
        let mut store = MemoryStore::new();

        let count = importer().import_trips(&feed, &mut store).unwrap();

        assert_eq!(count, 3);
        assert_eq!(store.rt_trips.len(), 3);
        assert_eq!(store.rt_trips[0].trip_id, "t1");
        assert_eq!(store.rt_trips[0].schedule_relationship, "SCHEDULED");
    }

    #[test]
    fn test_malformed_trip_update_is_skipped_not_fatal() {
        let feed = feed(vec![
            trip_update_entity("1", None, vec![]),
            trip_update_entity("2", Some("t2"), vec![]),
        ]);
        let mut store = MemoryStore::new();

        let count = importer().import_trips(&feed, &mut store).unwrap();

        assert_eq!(count, 1);
        assert_eq!(store.rt_trips[0].trip_id, "t2");
    }

    #[test]
    fn test_import_stop_times_flattens_nested_updates() {
        let feed = feed(vec![
            trip_update_entity(
                "1",
                Some("t1"),
                vec![
                    stop_update(Some("s1"), Some(1), 60),
                    stop_update(Some("s2"), Some(2), 120),
                ],
            ),
            trip_update_entity("2", Some("t2"), vec![stop_update(None, Some(4), -30)]),
            vehicle_entity("3"),
        ]);
        let mut store = MemoryStore::new();

        let count = importer().import_stop_times(&feed, &mut store).unwrap();

        assert_eq!(count, 3);
        assert_eq!(store.rt_stop_times[0].arrival_delay, Some(60));
        assert_eq!(store.rt_stop_times[2].trip_id, "t2");
        assert_eq!(store.rt_stop_times[2].stop_id, None);
        assert_eq!(store.rt_stop_times[2].stop_sequence, Some(4));
    }

    #[test]
    fn test_stop_time_update_without_stop_reference_skipped() {
        let feed = feed(vec![trip_update_entity(
            "1",
            Some("t1"),
            vec![stop_update(None, None, 0), stop_update(Some("s1"), None, 0)],
        )]);
        let mut store = MemoryStore::new();

        let count = importer().import_stop_times(&feed, &mut store).unwrap();

        assert_eq!(count, 1);
        assert_eq!(store.rt_stop_times[0].stop_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_clear_table_stop_trip_truncates_both() {
        let feed = feed(vec![trip_update_entity(
            "1",
            Some("t1"),
            vec![stop_update(Some("s1"), Some(1), 0)],
        )]);
        let mut store = MemoryStore::new();
        let imp = importer();
        imp.import_trips(&feed, &mut store).unwrap();
        imp.import_stop_times(&feed, &mut store).unwrap();

        imp.clear_table_stop_trip(&mut store).unwrap();

        assert!(store.rt_trips.is_empty());
        assert!(store.rt_stop_times.is_empty());
    }
}
