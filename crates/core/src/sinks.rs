//! Collaborator interfaces consumed by the ingestion pipeline and the HTTP
//! layer.
//!
//! Each sink is an independently owned external service. Implementations
//! live in `envmon-db` (storage) and `envmon-delivery` (notification,
//! forwarding); they are constructed in `main` and injected as
//! `Arc<dyn ...>`.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::reading::{ReadingStats, SensorReading};
use crate::types::Timestamp;

/// Append-only store of sensor readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist one reading.
    async fn save(&self, reading: &SensorReading) -> Result<(), SinkError>;

    /// Most recent reading by timestamp.
    async fn latest(&self) -> Result<Option<SensorReading>, SinkError>;

    /// Readings with `start <= timestamp <= end`, newest first.
    async fn range(&self, start: Timestamp, end: Timestamp)
        -> Result<Vec<SensorReading>, SinkError>;

    /// Every alerted reading, newest first.
    async fn alerts(&self) -> Result<Vec<SensorReading>, SinkError>;

    /// Aggregate statistics across all readings.
    async fn aggregate(&self) -> Result<ReadingStats, SinkError>;

    /// Cheap liveness probe used by health checks.
    async fn ping(&self) -> Result<(), SinkError>;
}

/// Delivers a text alert to an external notification service.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, body: &str, subject: &str) -> Result<(), SinkError>;
}

/// Republishes readings to a second message transport.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), SinkError>;
}
