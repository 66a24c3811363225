//! Bounded ingestion queue and concurrency-limited dispatch.
//!
//! The inbound transport pushes [`InboundMessage`]s into a bounded channel;
//! when the channel is full the sender waits, which propagates backpressure
//! to the transport's event loop. The [`Dispatcher`] drains the channel and
//! runs the pipeline with at most `max_in_flight` messages in progress.
//! With `max_in_flight == 1` messages are fully processed in arrival order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::ingest::{InboundMessage, Pipeline};

/// How long in-flight messages may run after shutdown is requested.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the bounded channel between the inbound transport and the dispatcher.
pub fn ingest_channel(
    capacity: usize,
) -> (mpsc::Sender<InboundMessage>, mpsc::Receiver<InboundMessage>) {
    mpsc::channel(capacity.max(1))
}

/// Counters reported when the dispatcher stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Messages that parsed and went through every stage.
    pub processed: u64,
    /// Messages dropped as malformed.
    pub rejected: u64,
    /// Pipeline tasks that panicked or were aborted at shutdown.
    pub aborted: u64,
}

impl DispatchSummary {
    fn record(&mut self, result: Result<bool, JoinError>) {
        match result {
            Ok(true) => self.processed += 1,
            Ok(false) => self.rejected += 1,
            Err(e) => {
                if e.is_panic() {
                    tracing::error!(error = %e, "Pipeline task panicked");
                }
                self.aborted += 1;
            }
        }
    }
}

/// Runs the pipeline for every queued message.
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    max_in_flight: usize,
    drain_timeout: Duration,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<Pipeline>, max_in_flight: usize) -> Self {
        Self {
            pipeline,
            max_in_flight: max_in_flight.max(1),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Consume the queue until it closes or `cancel` fires.
    ///
    /// On shutdown no new messages are started; in-flight ones get up to the
    /// drain timeout to finish before they are aborted.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<InboundMessage>,
        cancel: CancellationToken,
    ) -> DispatchSummary {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut summary = DispatchSummary::default();

        tracing::info!(max_in_flight = self.max_in_flight, "Dispatcher started");

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            while let Some(result) = tasks.try_join_next() {
                summary.record(result);
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(topic = %message.topic, "Shutdown requested, message not processed");
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let pipeline = self.pipeline.clone();
            tasks.spawn(async move {
                let _permit = permit;
                pipeline.process(&message).await.is_ok()
            });
        }

        let in_flight = tasks.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight messages");
        }

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(result) = tasks.join_next().await {
                summary.record(result);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(remaining = tasks.len(), "Drain timeout elapsed, aborting pipeline tasks");
            tasks.abort_all();
            while let Some(result) = tasks.join_next().await {
                summary.record(result);
            }
        }

        tracing::info!(
            processed = summary.processed,
            rejected = summary.rejected,
            aborted = summary.aborted,
            "Dispatcher stopped"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use envmon_core::error::SinkError;
    use envmon_core::reading::{ReadingStats, SensorReading};
    use envmon_core::sinks::{Forwarder, Notifier, ReadingStore};
    use envmon_core::thresholds::ThresholdSet;
    use envmon_core::types::Timestamp;

    use super::*;
    use crate::ingest::PipelineConfig;

    /// Store that sleeps longer for lower temperatures, so out-of-order
    /// completion would show up if messages overlapped.
    #[derive(Default)]
    struct SlowStore {
        order: Mutex<Vec<f64>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ReadingStore for SlowStore {
        async fn save(&self, reading: &SensorReading) -> Result<(), SinkError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = 50u64.saturating_sub(reading.temperature as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.order.lock().unwrap().push(reading.temperature);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
        async fn latest(&self) -> Result<Option<SensorReading>, SinkError> {
            Ok(None)
        }
        async fn range(&self, _: Timestamp, _: Timestamp) -> Result<Vec<SensorReading>, SinkError> {
            Ok(Vec::new())
        }
        async fn alerts(&self) -> Result<Vec<SensorReading>, SinkError> {
            Ok(Vec::new())
        }
        async fn aggregate(&self) -> Result<ReadingStats, SinkError> {
            Ok(ReadingStats::default())
        }
        async fn ping(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct Discard;

    #[async_trait]
    impl Notifier for Discard {
        async fn send(&self, _: &str, _: &str) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Forwarder for Discard {
        async fn publish(&self, _: &str, _: &serde_json::Value) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn pipeline(store: Arc<SlowStore>) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            ThresholdSet::default(),
            store,
            Arc::new(Discard),
            Arc::new(Discard),
            PipelineConfig::default(),
        ))
    }

    fn reading(temperature: u32) -> InboundMessage {
        let json = format!(
            r#"{{"temperature": {temperature}, "light": 500, "accel_x": 0, "accel_y": 0, "accel_z": 1}}"#
        );
        InboundMessage::new("envmonitor/data", json.into_bytes())
    }

    #[tokio::test(start_paused = true)]
    async fn single_in_flight_preserves_arrival_order() {
        let store = Arc::new(SlowStore::default());
        let (tx, rx) = ingest_channel(16);

        for t in [10, 20, 30, 40] {
            tx.send(reading(t)).await.unwrap();
        }
        tx.send(InboundMessage::new("envmonitor/data", b"garbage".to_vec()))
            .await
            .unwrap();
        drop(tx);

        let summary = Dispatcher::new(pipeline(store.clone()), 1)
            .run(rx, CancellationToken::new())
            .await;

        assert_eq!(
            summary,
            DispatchSummary {
                processed: 4,
                rejected: 1,
                aborted: 0
            }
        );
        assert_eq!(*store.order.lock().unwrap(), vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(store.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_limit_is_respected() {
        let store = Arc::new(SlowStore::default());
        let (tx, rx) = ingest_channel(16);

        for t in 0..8 {
            tx.send(reading(t)).await.unwrap();
        }
        drop(tx);

        let summary = Dispatcher::new(pipeline(store.clone()), 3)
            .run(rx, CancellationToken::new())
            .await;

        assert_eq!(summary.processed, 8);
        assert!(store.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(store.order.lock().unwrap().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let store = Arc::new(SlowStore::default());
        let (tx, rx) = ingest_channel(4);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(Dispatcher::new(pipeline(store), 1).run(rx, cancel.clone()));
        tx.send(reading(25)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let summary = handle.await.unwrap();
        assert_eq!(summary.processed, 1);
        // The receiver is gone once the dispatcher returns.
        assert!(tx.is_closed());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (tx, _rx) = ingest_channel(0);
        assert_eq!(tx.max_capacity(), 1);
    }
}
