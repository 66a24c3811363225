//! Ingestion worker: subscribes to the sensor topic, runs every reading
//! through the pipeline and fans alerts out to the notification channels.

pub mod config;
pub mod error;
pub mod simulate;
pub mod subscriber;
