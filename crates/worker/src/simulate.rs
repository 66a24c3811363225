//! Synthetic sensor readings for the `envmon-sim` test publisher.

use std::time::Duration;

use chrono::Utc;
use envmon_core::env::{self, Lookup};
use envmon_core::error::ConfigError;
use envmon_delivery::BrokerConfig;
use rand::Rng;

use crate::config::DEFAULT_INBOUND_TOPIC;

const CLIENT_ID_PREFIX: &str = "envmon-sim";
const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Roughly one reading in this many is pushed out of range.
const ANOMALY_ONE_IN: u32 = 5;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub broker: BrokerConfig,
    pub topic: String,
    pub interval: Duration,
}

impl SimulatorConfig {
    /// Reads the inbound `MQTT_*` variables plus `SIM_INTERVAL_SECS`
    /// (default `5`).
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let interval_secs = env::parse_or(lookup, "SIM_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;
        Ok(Self {
            broker: BrokerConfig::inbound_from_lookup(lookup, CLIENT_ID_PREFIX)?,
            topic: env::optional(lookup, "MQTT_TOPIC")
                .unwrap_or_else(|| DEFAULT_INBOUND_TOPIC.to_string()),
            interval: Duration::from_secs(interval_secs.max(1)),
        })
    }
}

/// One reading payload as a device would publish it.
///
/// Values sit inside the default thresholds except for the occasional
/// anomaly (hot, dark, bright or shaken) so alerts can be exercised.
pub fn synthetic_reading<R: Rng + ?Sized>(rng: &mut R) -> serde_json::Value {
    let mut temperature: f64 = rng.random_range(21.0..29.0);
    let mut light: f64 = rng.random_range(200.0..900.0);
    let (mut ax, mut ay, mut az): (f64, f64, f64) = (
        rng.random_range(-0.1..0.1),
        rng.random_range(-0.1..0.1),
        rng.random_range(0.9..1.1),
    );

    if rng.random_ratio(1, ANOMALY_ONE_IN) {
        match rng.random_range(0..4) {
            0 => temperature = rng.random_range(31.0..40.0),
            1 => light = rng.random_range(0.0..90.0),
            2 => light = rng.random_range(1100.0..2000.0),
            _ => {
                ax = rng.random_range(1.5..3.0);
                ay = rng.random_range(1.5..3.0);
                az = rng.random_range(1.5..3.0);
            }
        }
    }

    serde_json::json!({
        "temperature": round2(temperature),
        "light": light.round(),
        "accel_x": round2(ax),
        "accel_y": round2(ay),
        "accel_z": round2(az),
        "timestamp": Utc::now().to_rfc3339(),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
