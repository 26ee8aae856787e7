//! Event notification.
//!
//! A completed import run is recorded as one structured event. Recording is
//! an explicit, awaited call whose result the caller sees; a sink failure is
//! a real error, not something dropped on the floor.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Static schedule tables were replaced.
    #[serde(rename = "GTFS_DATABASE_UPDATED")]
    GtfsDatabaseUpdated,
    /// Realtime snapshot tables were replaced.
    #[serde(rename = "REALTIME_DATABASE_UPDATED")]
    RealtimeDatabaseUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub created_at: DateTime<Utc>,
    pub event_type: EventType,
    pub message: String,
    pub attributes: serde_json::Value,
}

/// Destination for run-completion events.
#[async_trait::async_trait]
pub trait EventSink {
    async fn record(
        &mut self,
        event_type: EventType,
        message: &str,
        attributes: serde_json::Value,
    ) -> Result<()>;
}

/// Appends one JSON object per event to a file, newest last.
pub struct JsonlEventSink {
    path: PathBuf,
}

impl JsonlEventSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl EventSink for JsonlEventSink {
    async fn record(
        &mut self,
        event_type: EventType,
        message: &str,
        attributes: serde_json::Value,
    ) -> Result<()> {
        let event = Event {
            created_at: Utc::now(),
            event_type,
            message: message.to_string(),
            attributes,
        };

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        serde_json::to_writer(&mut file, &event)?;
        file.write_all(b"\n")?;
        debug!(path = %self.path.display(), ?event_type, "event recorded");
        Ok(())
    }
}

/// Test double that keeps recorded events in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    pub events: Vec<Event>,
}

#[async_trait::async_trait]
impl EventSink for RecordingEventSink {
    async fn record(
        &mut self,
        event_type: EventType,
        message: &str,
        attributes: serde_json::Value,
    ) -> Result<()> {
        self.events.push(Event {
            created_at: Utc::now(),
            event_type,
            message: message.to_string(),
            attributes,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_jsonl_sink_appends_one_line_per_event() {
        let path = std::env::temp_dir().join("gtfs_ingest_events_test.jsonl");
        let _ = std::fs::remove_file(&path);

        let mut sink = JsonlEventSink::new(&path);
        sink.record(
            EventType::GtfsDatabaseUpdated,
            "GTFS static data updated with latest schedules",
            json!({"dataset": "TFI"}),
        )
        .await
        .unwrap();
        sink.record(
            EventType::RealtimeDatabaseUpdated,
            "Realtime database updated with new realtime information",
            json!({"dataset": "TFI"}),
        )
        .await
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("GTFS_DATABASE_UPDATED"));
        assert!(lines[1].contains("REALTIME_DATABASE_UPDATED"));

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_recording_sink_captures_attributes() {
        let mut sink = RecordingEventSink::default();
        sink.record(
            EventType::GtfsDatabaseUpdated,
            "msg",
            json!({"totals": {"agency": {"row_count": 2}}}),
        )
        .await
        .unwrap();

        assert_eq!(sink.events.len(), 1);
        assert_eq!(
            sink.events[0].attributes["totals"]["agency"]["row_count"],
            2
        );
    }
}
