//! In-process [`ReadingStore`] used by tests and database-less local runs.

use async_trait::async_trait;
use envmon_core::error::SinkError;
use envmon_core::reading::{ReadingStats, SensorReading};
use envmon_core::sinks::ReadingStore;
use envmon_core::types::Timestamp;
use tokio::sync::RwLock;

/// Append-only vector of readings guarded by an async `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    readings: RwLock<Vec<SensorReading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }

    /// Snapshot of the stored readings in insertion order.
    pub async fn snapshot(&self) -> Vec<SensorReading> {
        self.readings.read().await.clone()
    }
}

/// Newest first; insertion order breaks timestamp ties (later insert first).
fn newest_first(mut readings: Vec<SensorReading>) -> Vec<SensorReading> {
    readings.reverse();
    readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    readings
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn save(&self, reading: &SensorReading) -> Result<(), SinkError> {
        self.readings.write().await.push(reading.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<SensorReading>, SinkError> {
        let readings = self.readings.read().await;
        // max_by_key keeps the last maximum, so ties go to the later insert.
        Ok(readings.iter().max_by_key(|r| r.timestamp).cloned())
    }

    async fn range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<SensorReading>, SinkError> {
        let readings = self.readings.read().await;
        let matching = readings
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn alerts(&self) -> Result<Vec<SensorReading>, SinkError> {
        let readings = self.readings.read().await;
        let alerted = readings.iter().filter(|r| r.alert).cloned().collect();
        Ok(newest_first(alerted))
    }

    async fn aggregate(&self) -> Result<ReadingStats, SinkError> {
        Ok(ReadingStats::from_readings(&self.readings.read().await))
    }

    async fn ping(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
