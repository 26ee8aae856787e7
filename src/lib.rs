pub mod error;
pub mod events;
pub mod fetch;
pub mod importer;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod reader;
pub mod realtime;
pub mod registry;
pub mod store;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
