//! Static threshold policy for sensor readings.
//!
//! Pure logic with no I/O: the caller passes in a reading and the
//! process-wide [`ThresholdSet`] and gets back the ordered list of
//! violations.

use crate::env::{self, Lookup};
use crate::error::{ConfigError, CoreError};
use crate::reading::SensorReading;

/// Inclusive `[min, max]` bounds for a scalar measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

/// Process-wide, read-only alert thresholds.
///
/// Fixed at startup; shared between concurrent pipeline runs behind an
/// `Arc` without synchronisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSet {
    /// Degrees Celsius.
    pub temperature: Bounds,
    /// Lux.
    pub light: Bounds,
    /// Maximum acceleration magnitude in g.
    pub movement_max: f64,
}

impl ThresholdSet {
    /// Build a threshold set, rejecting inverted bounds or a negative
    /// movement limit.
    pub fn new(temperature: Bounds, light: Bounds, movement_max: f64) -> Result<Self, CoreError> {
        check_bounds("temperature", temperature)?;
        check_bounds("light", light)?;
        if !(movement_max >= 0.0) {
            return Err(CoreError::Validation(format!(
                "movement threshold must be a non-negative number, got {movement_max}"
            )));
        }
        Ok(Self {
            temperature,
            light,
            movement_max,
        })
    }

    /// Load thresholds from the environment, falling back to the defaults
    /// for any variable that is not set.
    ///
    /// | Variable                 | Default |
    /// |--------------------------|---------|
    /// | `THRESHOLD_TEMP_MIN`     | `20`    |
    /// | `THRESHOLD_TEMP_MAX`     | `30`    |
    /// | `THRESHOLD_LIGHT_MIN`    | `100`   |
    /// | `THRESHOLD_LIGHT_MAX`    | `1000`  |
    /// | `THRESHOLD_MOVEMENT_MAX` | `2.0`   |
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let temperature = Bounds {
            min: env::parse_or(lookup, "THRESHOLD_TEMP_MIN", defaults.temperature.min)?,
            max: env::parse_or(lookup, "THRESHOLD_TEMP_MAX", defaults.temperature.max)?,
        };
        let light = Bounds {
            min: env::parse_or(lookup, "THRESHOLD_LIGHT_MIN", defaults.light.min)?,
            max: env::parse_or(lookup, "THRESHOLD_LIGHT_MAX", defaults.light.max)?,
        };
        let movement_max = env::parse_or(lookup, "THRESHOLD_MOVEMENT_MAX", defaults.movement_max)?;

        Ok(Self::new(temperature, light, movement_max)?)
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            temperature: Bounds {
                min: 20.0,
                max: 30.0,
            },
            light: Bounds {
                min: 100.0,
                max: 1000.0,
            },
            movement_max: 2.0,
        }
    }
}

fn check_bounds(name: &str, bounds: Bounds) -> Result<(), CoreError> {
    if !(bounds.min <= bounds.max) {
        return Err(CoreError::Validation(format!(
            "{name} min ({}) must not exceed max ({})",
            bounds.min, bounds.max
        )));
    }
    Ok(())
}

/// Magnitude of a 3-axis acceleration vector: `sqrt(x² + y² + z²)`.
pub fn magnitude(x: f64, y: f64, z: f64) -> f64 {
    (x * x + y * y + z * z).sqrt()
}

/// Check a reading against the thresholds.
///
/// Violations are always ordered temperature, light, movement. Low/high
/// checks for one measurement are mutually exclusive. NaN values fail every
/// comparison and so never produce a violation.
pub fn evaluate(reading: &SensorReading, thresholds: &ThresholdSet) -> Vec<String> {
    let mut violations = Vec::new();

    let t = reading.temperature;
    if t < thresholds.temperature.min {
        violations.push(format!("Temperature too low: {t}°C"));
    } else if t > thresholds.temperature.max {
        violations.push(format!("Temperature too high: {t}°C"));
    }

    let l = reading.light;
    if l < thresholds.light.min {
        violations.push(format!("Light level too low: {l} lux"));
    } else if l > thresholds.light.max {
        violations.push(format!("Light level too high: {l} lux"));
    }

    let movement = magnitude(reading.accel_x, reading.accel_y, reading.accel_z);
    if movement > thresholds.movement_max {
        violations.push(format!("Significant movement detected: {movement:.2}g"));
    }

    violations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
