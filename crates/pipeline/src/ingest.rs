//! Per-message ingestion pipeline.
//!
//! Stages run sequentially for one message:
//!
//! 1. parse -- a malformed payload ends processing before any sink is called
//! 2. evaluate -- thresholds decide the alert flag and message
//! 3. persist -- storage sink
//! 4. notify -- notification sink, only when alerting
//! 5. forward -- forwarding sink, with a fresh timestamp
//!
//! Stages 3–5 are independent: each is bounded by the configured timeout and
//! its failure is logged and recorded in the [`IngestReport`] without
//! affecting the others. Nothing is retried here.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use envmon_core::alert::{evaluate_and_compose, AlertMessage};
use envmon_core::error::SinkError;
use envmon_core::reading::{ReadingPayload, SensorReading};
use envmon_core::sinks::{Forwarder, Notifier, ReadingStore};
use envmon_core::thresholds::ThresholdSet;
use envmon_core::types::Timestamp;

/// Topic readings are forwarded to by default.
pub const DEFAULT_FORWARD_TOPIC: &str = "envmonitor/data";

/// Default upper bound for a single sink call.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A raw message as delivered by the inbound transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Used as the reading timestamp when the payload carries none.
    pub received_at: Timestamp,
}

impl InboundMessage {
    /// Wrap a payload received just now.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Errors that end processing of a message.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The payload is not a valid sensor reading (bad JSON, missing or
    /// non-numeric field). The message is dropped.
    #[error("Malformed payload on topic {topic}: {source}")]
    Parse {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Downstream stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Persist,
    Notify,
    Forward,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Persist => "persist",
            Stage::Notify => "notify",
            Stage::Forward => "forward",
        })
    }
}

/// What happened in one downstream stage.
#[derive(Debug)]
pub enum StageOutcome {
    Completed,
    /// The stage did not apply (notify on a non-alerting reading).
    Skipped,
    Failed(SinkError),
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// Result of processing one well-formed message.
#[derive(Debug)]
pub struct IngestReport {
    /// The reading as persisted (alert flag set, original timestamp).
    pub reading: SensorReading,
    /// The composed alert, when the reading violated a threshold.
    pub alert: Option<AlertMessage>,
    pub persist: StageOutcome,
    pub notify: StageOutcome,
    pub forward: StageOutcome,
}

/// Tunables for the downstream stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Topic on the forwarding transport.
    pub forward_topic: String,
    /// Upper bound for each persist / notify / forward call.
    pub sink_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            forward_topic: DEFAULT_FORWARD_TOPIC.to_string(),
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Stateless per-message pipeline over injected collaborators.
///
/// Shared behind an `Arc` by the dispatcher; holds no mutable state, so
/// concurrent calls to [`process`](Pipeline::process) are independent.
pub struct Pipeline {
    thresholds: ThresholdSet,
    store: Arc<dyn ReadingStore>,
    notifier: Arc<dyn Notifier>,
    forwarder: Arc<dyn Forwarder>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        thresholds: ThresholdSet,
        store: Arc<dyn ReadingStore>,
        notifier: Arc<dyn Notifier>,
        forwarder: Arc<dyn Forwarder>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            thresholds,
            store,
            notifier,
            forwarder,
            config,
        }
    }

    /// Decode an inbound payload into a reading candidate (alert unset).
    pub fn parse(message: &InboundMessage) -> Result<SensorReading, IngestError> {
        let payload: ReadingPayload =
            serde_json::from_slice(&message.payload).map_err(|source| IngestError::Parse {
                topic: message.topic.clone(),
                source,
            })?;
        Ok(payload.into_reading(message.received_at))
    }

    /// Run every stage for one message.
    ///
    /// Returns `Err` only when the payload cannot be parsed, in which case
    /// no sink has been called. Sink failures are reported inside the
    /// [`IngestReport`].
    pub async fn process(&self, message: &InboundMessage) -> Result<IngestReport, IngestError> {
        let mut reading = Self::parse(message).inspect_err(|e| {
            tracing::warn!(topic = %message.topic, error = %e, "Dropping malformed sensor message");
        })?;

        let decision = evaluate_and_compose(&reading, &self.thresholds);
        reading.alert = decision.is_alert;

        let persist = self.run_stage(Stage::Persist, self.store.save(&reading)).await;

        let notify = match &decision.message {
            Some(alert) => {
                self.run_stage(Stage::Notify, self.notifier.send(&alert.body, &alert.subject))
                    .await
            }
            None => StageOutcome::Skipped,
        };

        let forward = self.forward(&reading).await;

        tracing::info!(
            topic = %message.topic,
            alert = reading.alert,
            temperature = reading.temperature,
            light = reading.light,
            stored = persist.is_completed(),
            notified = notify.is_completed(),
            forwarded = forward.is_completed(),
            "Sensor reading processed"
        );

        Ok(IngestReport {
            reading,
            alert: decision.message,
            persist,
            notify,
            forward,
        })
    }

    /// Forward a copy of the reading stamped with the forwarding time.
    async fn forward(&self, reading: &SensorReading) -> StageOutcome {
        let forwarded = reading.restamped(Utc::now());
        let payload = match serde_json::to_value(&forwarded) {
            Ok(payload) => payload,
            Err(e) => {
                let err = SinkError::Forwarding(format!("payload encoding failed: {e}"));
                tracing::error!(stage = %Stage::Forward, error = %err, "Pipeline stage failed");
                return StageOutcome::Failed(err);
            }
        };

        self.run_stage(
            Stage::Forward,
            self.forwarder.publish(&self.config.forward_topic, &payload),
        )
        .await
    }

    /// Await one sink call under the stage timeout and log any failure.
    async fn run_stage<F>(&self, stage: Stage, call: F) -> StageOutcome
    where
        F: Future<Output = Result<(), SinkError>>,
    {
        let result = match tokio::time::timeout(self.config.sink_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(self.config.sink_timeout)),
        };

        match result {
            Ok(()) => StageOutcome::Completed,
            Err(e) => {
                tracing::error!(stage = %stage, error = %e, "Pipeline stage failed");
                StageOutcome::Failed(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    /// Records every call; optionally fails or hangs.
    #[derive(Default)]
    struct Recorder {
        saved: Mutex<Vec<SensorReading>>,
        sent: Mutex<Vec<(String, String)>>,
        published: Mutex<Vec<(String, serde_json::Value)>>,
        fail: bool,
        hang: bool,
    }

    impl Recorder {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Default::default()
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                hang: true,
                ..Default::default()
            })
        }

        async fn outcome(&self, make_err: fn(String) -> SinkError) -> Result<(), SinkError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(make_err("unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ReadingStore for Recorder {
        async fn save(&self, reading: &SensorReading) -> Result<(), SinkError> {
            self.saved.lock().unwrap().push(reading.clone());
            self.outcome(SinkError::Storage).await
        }
        async fn latest(&self) -> Result<Option<SensorReading>, SinkError> {
            Ok(None)
        }
        async fn range(
            &self,
            _start: Timestamp,
            _end: Timestamp,
        ) -> Result<Vec<SensorReading>, SinkError> {
            Ok(Vec::new())
        }
        async fn alerts(&self) -> Result<Vec<SensorReading>, SinkError> {
            Ok(Vec::new())
        }
        async fn aggregate(&self) -> Result<envmon_core::reading::ReadingStats, SinkError> {
            Ok(Default::default())
        }
        async fn ping(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send(&self, body: &str, subject: &str) -> Result<(), SinkError> {
            self.sent
                .lock()
                .unwrap()
                .push((body.to_string(), subject.to_string()));
            self.outcome(SinkError::Notification).await
        }
    }

    #[async_trait]
    impl Forwarder for Recorder {
        async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), SinkError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.clone()));
            self.outcome(SinkError::Forwarding).await
        }
    }

    fn pipeline(store: Arc<Recorder>, notifier: Arc<Recorder>, forwarder: Arc<Recorder>) -> Pipeline {
        Pipeline::new(
            ThresholdSet::default(),
            store,
            notifier,
            forwarder,
            PipelineConfig {
                forward_topic: "envmonitor/data".to_string(),
                sink_timeout: Duration::from_millis(200),
            },
        )
    }

    fn message(json: &str) -> InboundMessage {
        InboundMessage::new("envmonitor/data", json.as_bytes().to_vec())
    }

    const HOT: &str =
        r#"{"temperature": 35, "light": 500, "accel_x": 0, "accel_y": 0, "accel_z": 1}"#;
    const CALM: &str =
        r#"{"temperature": 25, "light": 500, "accel_x": 1, "accel_y": 1, "accel_z": 1}"#;

    #[tokio::test]
    async fn alerting_reading_runs_every_stage() {
        let (store, notifier, forwarder) = (
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
        );
        let p = pipeline(store.clone(), notifier.clone(), forwarder.clone());

        let report = p.process(&message(HOT)).await.expect("payload is valid");

        assert!(report.reading.alert);
        assert!(report.persist.is_completed());
        assert!(report.notify.is_completed());
        assert!(report.forward.is_completed());

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].alert);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(
            sent[0],
            (
                "Smart Environment Monitor Alerts:\nTemperature too high: 35°C".to_string(),
                "Environmental Alert".to_string()
            )
        );

        let published = forwarder.published.lock().unwrap();
        assert_eq!(published[0].0, "envmonitor/data");
        assert_eq!(published[0].1["alert"], true);
        assert_eq!(published[0].1["temperature"], 35.0);
    }

    #[tokio::test]
    async fn quiet_reading_skips_notification() {
        let (store, notifier, forwarder) = (
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
        );
        let p = pipeline(store.clone(), notifier.clone(), forwarder.clone());

        let report = p.process(&message(CALM)).await.unwrap();

        assert!(!report.reading.alert);
        assert!(report.alert.is_none());
        assert_matches!(report.notify, StageOutcome::Skipped);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert_eq!(store.saved.lock().unwrap().len(), 1);
        assert_eq!(forwarder.published.lock().unwrap()[0].1["alert"], false);
    }

    #[tokio::test]
    async fn storage_failure_does_not_block_notify_or_forward() {
        let (store, notifier, forwarder) = (
            Recorder::failing(),
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
        );
        let p = pipeline(store, notifier.clone(), forwarder.clone());

        let report = p.process(&message(HOT)).await.unwrap();

        assert_matches!(report.persist, StageOutcome::Failed(SinkError::Storage(_)));
        assert!(report.notify.is_completed());
        assert!(report.forward.is_completed());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
        assert_eq!(forwarder.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notification_failure_still_forwards() {
        let (store, notifier, forwarder) = (
            Arc::new(Recorder::default()),
            Recorder::failing(),
            Arc::new(Recorder::default()),
        );
        let p = pipeline(store, notifier, forwarder.clone());

        let report = p.process(&message(HOT)).await.unwrap();

        assert!(report.persist.is_completed());
        assert_matches!(report.notify, StageOutcome::Failed(SinkError::Notification(_)));
        assert!(report.forward.is_completed());
    }

    #[tokio::test]
    async fn forwarding_failure_is_reported_not_raised() {
        let p = pipeline(
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
            Recorder::failing(),
        );

        let report = p.process(&message(CALM)).await.unwrap();
        assert_matches!(report.forward, StageOutcome::Failed(SinkError::Forwarding(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_store_times_out_and_pipeline_continues() {
        let (notifier, forwarder) = (Arc::new(Recorder::default()), Arc::new(Recorder::default()));
        let p = pipeline(Recorder::hanging(), notifier.clone(), forwarder.clone());

        let report = p.process(&message(HOT)).await.unwrap();

        assert_matches!(report.persist, StageOutcome::Failed(SinkError::Timeout(d)) => {
            assert_eq!(d, Duration::from_millis(200));
        });
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
        assert_eq!(forwarder.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_touches_no_sink() {
        let (store, notifier, forwarder) = (
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
        );
        let p = pipeline(store.clone(), notifier.clone(), forwarder.clone());

        for bad in [
            r#"{"temperature": "warm", "light": 500, "accel_x": 0, "accel_y": 0, "accel_z": 1}"#,
            r#"{"temperature": 25, "light": 500, "accel_x": 0, "accel_y": 0}"#,
            "not json at all",
        ] {
            assert_matches!(p.process(&message(bad)).await, Err(IngestError::Parse { .. }));
        }

        assert!(store.saved.lock().unwrap().is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(forwarder.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forwarded_copy_gets_fresh_timestamp() {
        let (store, forwarder) = (Arc::new(Recorder::default()), Arc::new(Recorder::default()));
        let p = pipeline(store.clone(), Arc::new(Recorder::default()), forwarder.clone());

        let json = r#"{"temperature": 25, "light": 500, "accel_x": 0, "accel_y": 0, "accel_z": 1,
                       "timestamp": "2020-01-01T00:00:00Z"}"#;
        p.process(&message(json)).await.unwrap();

        let stored_ts = store.saved.lock().unwrap()[0].timestamp;
        assert_eq!(stored_ts.to_rfc3339(), "2020-01-01T00:00:00+00:00");

        let published = forwarder.published.lock().unwrap();
        let forwarded_ts: Timestamp =
            serde_json::from_value(published[0].1["timestamp"].clone()).unwrap();
        assert!(forwarded_ts > stored_ts);
    }
}
