//! Repository for the `sensor_readings` table (append-only time-series).

use envmon_core::reading::SensorReading;
use envmon_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::reading::{ReadingRow, ReadingStatsRow};

/// Column list for `sensor_readings` SELECT queries (includes `id` and `created_at`).
const COLUMNS: &str = "\
    id, temperature, light, accel_x, accel_y, accel_z, \
    alert, \"timestamp\", created_at";

/// Column list for `sensor_readings` INSERT statements (excludes auto-generated `id` and `created_at`).
const INSERT_COLUMNS: &str = "\
    temperature, light, accel_x, accel_y, accel_z, alert, \"timestamp\"";

/// Provides query operations for sensor readings.
pub struct ReadingRepo;

impl ReadingRepo {
    /// Insert a single reading.
    pub async fn insert(pool: &PgPool, reading: &SensorReading) -> Result<ReadingRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO sensor_readings ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ReadingRow>(&query)
            .bind(reading.temperature)
            .bind(reading.light)
            .bind(reading.accel_x)
            .bind(reading.accel_y)
            .bind(reading.accel_z)
            .bind(reading.alert)
            .bind(reading.timestamp)
            .fetch_one(pool)
            .await
    }

    /// Most recent reading by timestamp.
    pub async fn find_latest(pool: &PgPool) -> Result<Option<ReadingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sensor_readings \
             ORDER BY \"timestamp\" DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ReadingRow>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Readings within `[start, end]`, newest first.
    pub async fn list_between(
        pool: &PgPool,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<ReadingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sensor_readings \
             WHERE \"timestamp\" >= $1 AND \"timestamp\" <= $2 \
             ORDER BY \"timestamp\" DESC, id DESC"
        );
        sqlx::query_as::<_, ReadingRow>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(pool)
            .await
    }

    /// Every alerted reading, newest first.
    pub async fn list_alerts(pool: &PgPool) -> Result<Vec<ReadingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sensor_readings \
             WHERE alert \
             ORDER BY \"timestamp\" DESC, id DESC"
        );
        sqlx::query_as::<_, ReadingRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Averages, extremes and alert count over the whole table.
    ///
    /// Always returns one row; the aggregates are NULL on an empty table.
    pub async fn stats(pool: &PgPool) -> Result<ReadingStatsRow, sqlx::Error> {
        let query = "\
            SELECT \
                AVG(temperature) AS avg_temp, \
                MAX(temperature) AS max_temp, \
                MIN(temperature) AS min_temp, \
                AVG(light) AS avg_light, \
                COUNT(*) FILTER (WHERE alert) AS alert_count \
            FROM sensor_readings";
        sqlx::query_as::<_, ReadingStatsRow>(query)
            .fetch_one(pool)
            .await
    }
}
