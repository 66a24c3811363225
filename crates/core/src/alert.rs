//! Alert decision and message composition.
//!
//! This module only decides whether a reading is alerting and what the
//! notification should say. Delivery belongs to the ingestion pipeline.

use serde::Serialize;

use crate::reading::SensorReading;
use crate::thresholds::{self, ThresholdSet};

/// First line of every alert body.
pub const ALERT_HEADER: &str = "Smart Environment Monitor Alerts:";

/// Subject attached to every alert notification.
pub const ALERT_SUBJECT: &str = "Environmental Alert";

/// A composed alert for a single ingestion cycle. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    /// Violations in policy order (temperature, light, movement).
    pub violations: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    fn compose(violations: Vec<String>) -> Self {
        let mut body = String::from(ALERT_HEADER);
        for violation in &violations {
            body.push('\n');
            body.push_str(violation);
        }
        Self {
            violations,
            subject: ALERT_SUBJECT.to_string(),
            body,
        }
    }
}

/// Outcome of evaluating one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDecision {
    pub is_alert: bool,
    /// Present exactly when `is_alert` is true.
    pub message: Option<AlertMessage>,
}

/// Run the threshold policy and compose the alert message, if any.
pub fn evaluate_and_compose(reading: &SensorReading, thresholds: &ThresholdSet) -> AlertDecision {
    let violations = thresholds::evaluate(reading, thresholds);
    if violations.is_empty() {
        return AlertDecision {
            is_alert: false,
            message: None,
        };
    }

    AlertDecision {
        is_alert: true,
        message: Some(AlertMessage::compose(violations)),
    }
}
