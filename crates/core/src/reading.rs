//! Sensor reading types shared by the pipeline, storage and HTTP layers.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// One environmental observation, with its alert flag already decided.
///
/// `alert` is computed once at ingestion time and never recomputed from
/// stored data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Illuminance (lux).
    pub light: f64,
    /// Acceleration components in g.
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub alert: bool,
    pub timestamp: Timestamp,
}

impl SensorReading {
    /// Copy of this reading stamped with a new timestamp (used when
    /// forwarding).
    pub fn restamped(&self, timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

/// Wire shape of an inbound sensor message.
///
/// All five measurements are required and must be JSON numbers; unknown
/// fields (e.g. `deviceId`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadingPayload {
    pub temperature: f64,
    pub light: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl ReadingPayload {
    /// Build a reading candidate, defaulting the timestamp to `received_at`.
    /// The alert flag starts out `false` until the evaluator runs.
    pub fn into_reading(self, received_at: Timestamp) -> SensorReading {
        SensorReading {
            temperature: self.temperature,
            light: self.light,
            accel_x: self.accel_x,
            accel_y: self.accel_y,
            accel_z: self.accel_z,
            alert: false,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

/// Aggregate statistics over every stored reading.
///
/// The averages and extremes are `None` when nothing has been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingStats {
    pub avg_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub avg_light: Option<f64>,
    pub alert_count: i64,
}

impl ReadingStats {
    /// Compute statistics in memory. Mirrors the SQL aggregate used by the
    /// PostgreSQL store.
    pub fn from_readings(readings: &[SensorReading]) -> Self {
        if readings.is_empty() {
            return Self::default();
        }

        let n = readings.len() as f64;
        let temps = readings.iter().map(|r| r.temperature);

        Self {
            avg_temp: Some(temps.clone().sum::<f64>() / n),
            max_temp: temps.clone().reduce(f64::max),
            min_temp: temps.reduce(f64::min),
            avg_light: Some(readings.iter().map(|r| r.light).sum::<f64>() / n),
            alert_count: readings.iter().filter(|r| r.alert).count() as i64,
        }
    }
}
