//! Inbound MQTT subscriber.
//!
//! Drives the `rumqttc` event loop for the sensor broker and pushes every
//! PUBLISH into the bounded ingestion queue. The subscription is (re)issued
//! on each CONNACK, so a reconnect after a dropped connection resubscribes
//! without extra bookkeeping. While the queue is full the event loop is not
//! polled, which holds back further deliveries from the broker.

use envmon_delivery::mqtt::{BrokerConfig, MqttError, RECONNECT_DELAY};
use envmon_pipeline::InboundMessage;
use rumqttc::{AsyncClient, Event, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// Why the subscriber loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberExit {
    Cancelled,
    /// The dispatcher dropped the receiving end of the queue.
    QueueClosed,
}

/// Connect to the sensor broker and spawn the subscriber task.
pub fn start(
    config: &BrokerConfig,
    topic: String,
    queue: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) -> Result<JoinHandle<SubscriberExit>, MqttError> {
    let options = config.mqtt_options()?;
    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
    let host = config.host.clone();

    let handle = tokio::spawn(async move {
        let exit = loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break SubscriberExit::Cancelled,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(host = %host, topic = %topic, "Connected to sensor broker, subscribing");
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                        tracing::error!(topic = %topic, error = %e, "Failed to queue SUBSCRIBE");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    tracing::info!(topic = %topic, "Subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                    tokio::select! {
                        _ = cancel.cancelled() => break SubscriberExit::Cancelled,
                        sent = queue.send(message) => {
                            if sent.is_err() {
                                break SubscriberExit::QueueClosed;
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Sensor broker connection error, reconnecting");
                    tokio::select! {
                        _ = cancel.cancelled() => break SubscriberExit::Cancelled,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        };

        let _ = client.try_disconnect();
        tracing::info!(host = %host, reason = ?exit, "Subscriber stopped");
        exit
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use assert_matches::assert_matches;
    use envmon_delivery::mqtt::TlsFiles;

    use super::*;

    #[tokio::test]
    async fn missing_ca_file_fails_before_spawning() {
        let config = BrokerConfig {
            host: "localhost".to_string(),
            port: 8883,
            client_id: "envmon-test".to_string(),
            tls: Some(TlsFiles {
                ca: PathBuf::from("/nonexistent/root-CA.crt"),
                client_auth: None,
            }),
        };
        let (tx, _rx) = mpsc::channel(1);

        let result = start(&config, "envmonitor/data".to_string(), tx, CancellationToken::new());
        assert_matches!(result, Err(MqttError::TlsFile { .. }));
    }

    #[tokio::test]
    async fn cancellation_stops_an_unconnected_subscriber() {
        let config = BrokerConfig {
            // Port 9 is closed; the loop keeps failing to connect.
            host: "127.0.0.1".to_string(),
            port: 9,
            client_id: "envmon-test".to_string(),
            tls: None,
        };
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = start(&config, "envmonitor/data".to_string(), tx, cancel.clone()).unwrap();
        cancel.cancel();

        let exit = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("subscriber stops promptly")
            .unwrap();
        assert_eq!(exit, SubscriberExit::Cancelled);
    }
}
