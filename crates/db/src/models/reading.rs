//! Sensor reading rows (append-only).

use envmon_core::reading::{ReadingStats, SensorReading};
use envmon_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A persisted row of `sensor_readings`.
#[derive(Debug, Clone, FromRow)]
pub struct ReadingRow {
    pub id: DbId,
    pub temperature: f64,
    pub light: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub alert: bool,
    pub timestamp: Timestamp,
    pub created_at: Timestamp,
}

impl From<ReadingRow> for SensorReading {
    fn from(row: ReadingRow) -> Self {
        SensorReading {
            temperature: row.temperature,
            light: row.light,
            accel_x: row.accel_x,
            accel_y: row.accel_y,
            accel_z: row.accel_z,
            alert: row.alert,
            timestamp: row.timestamp,
        }
    }
}

/// Result row of the aggregate statistics query.
#[derive(Debug, Clone, FromRow)]
pub struct ReadingStatsRow {
    pub avg_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub avg_light: Option<f64>,
    pub alert_count: i64,
}

impl From<ReadingStatsRow> for ReadingStats {
    fn from(row: ReadingStatsRow) -> Self {
        ReadingStats {
            avg_temp: row.avg_temp,
            max_temp: row.max_temp,
            min_temp: row.min_temp,
            avg_light: row.avg_light,
            alert_count: row.alert_count,
        }
    }
}
