//! [`ReadingStore`] backed by PostgreSQL.

use async_trait::async_trait;
use envmon_core::error::SinkError;
use envmon_core::reading::{ReadingStats, SensorReading};
use envmon_core::sinks::ReadingStore;
use envmon_core::types::Timestamp;

use crate::repositories::ReadingRepo;
use crate::DbPool;

/// Storage sink that writes through [`ReadingRepo`].
#[derive(Clone)]
pub struct PgReadingStore {
    pool: DbPool,
}

impl PgReadingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn storage_error(err: sqlx::Error) -> SinkError {
    SinkError::Storage(err.to_string())
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn save(&self, reading: &SensorReading) -> Result<(), SinkError> {
        let row = ReadingRepo::insert(&self.pool, reading)
            .await
            .map_err(storage_error)?;
        tracing::debug!(id = row.id, alert = row.alert, "Reading stored");
        Ok(())
    }

    async fn latest(&self) -> Result<Option<SensorReading>, SinkError> {
        let row = ReadingRepo::find_latest(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(SensorReading::from))
    }

    async fn range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<SensorReading>, SinkError> {
        let rows = ReadingRepo::list_between(&self.pool, start, end)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(SensorReading::from).collect())
    }

    async fn alerts(&self) -> Result<Vec<SensorReading>, SinkError> {
        let rows = ReadingRepo::list_alerts(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(SensorReading::from).collect())
    }

    async fn aggregate(&self) -> Result<ReadingStats, SinkError> {
        let row = ReadingRepo::stats(&self.pool).await.map_err(storage_error)?;
        Ok(row.into())
    }

    async fn ping(&self) -> Result<(), SinkError> {
        crate::health_check(&self.pool).await.map_err(storage_error)
    }
}
