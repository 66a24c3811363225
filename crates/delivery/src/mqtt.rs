//! MQTT broker configuration and the forwarding sink.
//!
//! [`BrokerConfig`] describes one broker connection (address, client id,
//! optional TLS material) and is shared by the inbound subscriber in
//! `envmon-worker` and by [`MqttForwarder`]. Reconnection is left to the
//! `rumqttc` event loop: after a connection error the next `poll` dials the
//! broker again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use envmon_core::env::{self, Lookup};
use envmon_core::error::{ConfigError, SinkError};
use envmon_core::sinks::Forwarder;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Keep-alive interval sent in CONNECT.
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Pause between polls after a connection error.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the request channel between a client handle and its event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

const PLAIN_PORT: u16 = 1883;
const TLS_PORT: u16 = 8883;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors raised while preparing or using an MQTT connection.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// A certificate or key file could not be read.
    #[error("Failed to read {kind} file {path}: {source}")]
    TlsFile {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The client could not enqueue a request for the event loop.
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// The payload could not be encoded.
    #[error("Payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<MqttError> for SinkError {
    fn from(err: MqttError) -> Self {
        SinkError::Forwarding(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// BrokerConfig
// ---------------------------------------------------------------------------

/// TLS material for a broker connection.
#[derive(Debug, Clone, PartialEq)]
pub struct TlsFiles {
    pub ca: PathBuf,
    /// `(certificate, private key)` for mutual TLS.
    pub client_auth: Option<(PathBuf, PathBuf)>,
}

/// Connection settings for one MQTT broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub tls: Option<TlsFiles>,
}

/// Variable names for one broker's settings.
struct BrokerKeys {
    host: &'static str,
    port: &'static str,
    client_id: &'static str,
    ca: &'static str,
    cert: &'static str,
    key: &'static str,
}

const INBOUND_KEYS: BrokerKeys = BrokerKeys {
    host: "MQTT_HOST",
    port: "MQTT_PORT",
    client_id: "MQTT_CLIENT_ID",
    ca: "MQTT_CA_PATH",
    cert: "MQTT_CERT_PATH",
    key: "MQTT_KEY_PATH",
};

const FORWARD_KEYS: BrokerKeys = BrokerKeys {
    host: "FORWARD_MQTT_HOST",
    port: "FORWARD_MQTT_PORT",
    client_id: "FORWARD_MQTT_CLIENT_ID",
    ca: "FORWARD_MQTT_CA_PATH",
    cert: "FORWARD_MQTT_CERT_PATH",
    key: "FORWARD_MQTT_KEY_PATH",
};

/// Public broker used when `MQTT_HOST` is not set.
pub const DEFAULT_INBOUND_HOST: &str = "test.mosquitto.org";

/// Client id presented to the forwarding broker by default.
pub const DEFAULT_FORWARD_CLIENT_ID: &str = "smart-environment-monitor";

/// Generate a client id with a random suffix, e.g. `envmon-3f9a1c`.
pub fn random_client_id(prefix: &str) -> String {
    format!("{prefix}-{:06x}", rand::random::<u32>() & 0x00ff_ffff)
}

impl BrokerConfig {
    /// Settings for the broker carrying inbound sensor readings.
    ///
    /// | Variable         | Default                     |
    /// |------------------|-----------------------------|
    /// | `MQTT_HOST`      | `test.mosquitto.org`        |
    /// | `MQTT_PORT`      | `8883` with TLS, else `1883`|
    /// | `MQTT_CLIENT_ID` | `<prefix>-<random hex>`     |
    /// | `MQTT_CA_PATH`   | - (enables TLS)             |
    /// | `MQTT_CERT_PATH` | - (mutual TLS, with key)    |
    /// | `MQTT_KEY_PATH`  | -                           |
    pub fn inbound_from_lookup(
        lookup: &impl Lookup,
        client_id_prefix: &str,
    ) -> Result<Self, ConfigError> {
        let host = env::optional(lookup, INBOUND_KEYS.host)
            .unwrap_or_else(|| DEFAULT_INBOUND_HOST.to_string());
        let client_id = env::optional(lookup, INBOUND_KEYS.client_id)
            .unwrap_or_else(|| random_client_id(client_id_prefix));
        Self::from_keys(lookup, &INBOUND_KEYS, host, client_id)
    }

    /// Settings for the second broker that receives forwarded readings.
    /// `FORWARD_MQTT_HOST` is required; the other `FORWARD_MQTT_*`
    /// variables mirror the inbound ones.
    pub fn forward_from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let host = env::required(lookup, FORWARD_KEYS.host)?;
        let client_id = env::optional(lookup, FORWARD_KEYS.client_id)
            .unwrap_or_else(|| DEFAULT_FORWARD_CLIENT_ID.to_string());
        Self::from_keys(lookup, &FORWARD_KEYS, host, client_id)
    }

    fn from_keys(
        lookup: &impl Lookup,
        keys: &BrokerKeys,
        host: String,
        client_id: String,
    ) -> Result<Self, ConfigError> {
        let ca = env::optional(lookup, keys.ca).map(PathBuf::from);
        let cert = env::optional(lookup, keys.cert).map(PathBuf::from);
        let key = env::optional(lookup, keys.key).map(PathBuf::from);

        let client_auth = match (cert, key) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(keys.key)),
            (None, Some(_)) => return Err(ConfigError::Missing(keys.cert)),
        };

        let tls = match (ca, client_auth) {
            (Some(ca), client_auth) => Some(TlsFiles { ca, client_auth }),
            (None, None) => None,
            (None, Some(_)) => return Err(ConfigError::Missing(keys.ca)),
        };

        let default_port = if tls.is_some() { TLS_PORT } else { PLAIN_PORT };
        let port = env::parse_or(lookup, keys.port, default_port)?;

        Ok(Self {
            host,
            port,
            client_id,
            tls,
        })
    }

    /// Build `rumqttc` options, reading any TLS files from disk.
    ///
    /// Called once at startup so a missing certificate is fatal there
    /// rather than on the first publish.
    pub fn mqtt_options(&self) -> Result<MqttOptions, MqttError> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(KEEP_ALIVE);

        if let Some(tls) = &self.tls {
            let ca = read_tls_file("CA certificate", &tls.ca)?;
            let client_auth = match &tls.client_auth {
                Some((cert, key)) => Some((
                    read_tls_file("client certificate", cert)?,
                    read_tls_file("private key", key)?,
                )),
                None => None,
            };
            options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth,
            }));
        }

        Ok(options)
    }
}

fn read_tls_file(kind: &'static str, path: &Path) -> Result<Vec<u8>, MqttError> {
    std::fs::read(path).map_err(|source| MqttError::TlsFile {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// MqttForwarder
// ---------------------------------------------------------------------------

/// Forwarding sink that republishes readings to a second broker.
///
/// `publish` succeeds once the message is handed to the client's event loop;
/// broker acknowledgement (QoS 1) is tracked by `rumqttc` itself.
pub struct MqttForwarder {
    client: AsyncClient,
}

impl MqttForwarder {
    /// Connect to the broker and spawn the task that drives its event loop.
    ///
    /// The driver exits (after a clean DISCONNECT attempt) when `cancel`
    /// fires.
    pub fn start(
        config: &BrokerConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), MqttError> {
        let options = config.mqtt_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let host = config.host.clone();
        let driver_client = client.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = eventloop.poll() => event,
                };

                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!(host = %host, "Connected to forwarding broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(host = %host, error = %e, "Forwarding connection error, reconnecting");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                }
            }

            // Best effort; the broker also notices the dropped socket.
            let _ = driver_client.try_disconnect();
            tracing::info!(host = %host, "Forwarding connection shutting down");
        });

        Ok((Self { client }, handle))
    }
}

#[async_trait]
impl Forwarder for MqttForwarder {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), SinkError> {
        let bytes = serde_json::to_vec(payload).map_err(MqttError::from)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(MqttError::from)?;
        tracing::debug!(topic, "Reading forwarded");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key: &str| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn inbound_defaults_to_public_broker() {
        let config = BrokerConfig::inbound_from_lookup(&lookup(&[]), "envmon").unwrap();
        assert_eq!(config.host, DEFAULT_INBOUND_HOST);
        assert_eq!(config.port, 1883);
        assert!(config.client_id.starts_with("envmon-"));
        assert_eq!(config.client_id.len(), "envmon-".len() + 6);
        assert!(config.tls.is_none());
    }

    #[test]
    fn forward_requires_host() {
        assert_matches!(
            BrokerConfig::forward_from_lookup(&lookup(&[])),
            Err(ConfigError::Missing("FORWARD_MQTT_HOST"))
        );
    }

    #[test]
    fn forward_with_tls_defaults_to_secure_port() {
        let config = BrokerConfig::forward_from_lookup(&lookup(&[
            ("FORWARD_MQTT_HOST", "abc123-ats.iot.eu-west-1.amazonaws.com"),
            ("FORWARD_MQTT_CA_PATH", "certs/root-CA.crt"),
            ("FORWARD_MQTT_CERT_PATH", "certs/Monitor.cert.pem"),
            ("FORWARD_MQTT_KEY_PATH", "certs/Monitor.private.key"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8883);
        assert_eq!(config.client_id, DEFAULT_FORWARD_CLIENT_ID);
        let tls = config.tls.expect("tls configured");
        assert_eq!(tls.ca, PathBuf::from("certs/root-CA.crt"));
        assert!(tls.client_auth.is_some());
    }

    #[test]
    fn client_cert_without_key_is_rejected() {
        assert_matches!(
            BrokerConfig::forward_from_lookup(&lookup(&[
                ("FORWARD_MQTT_HOST", "broker.local"),
                ("FORWARD_MQTT_CA_PATH", "ca.crt"),
                ("FORWARD_MQTT_CERT_PATH", "client.pem"),
            ])),
            Err(ConfigError::Missing("FORWARD_MQTT_KEY_PATH"))
        );
    }

    #[test]
    fn client_auth_without_ca_is_rejected() {
        assert_matches!(
            BrokerConfig::forward_from_lookup(&lookup(&[
                ("FORWARD_MQTT_HOST", "broker.local"),
                ("FORWARD_MQTT_CERT_PATH", "client.pem"),
                ("FORWARD_MQTT_KEY_PATH", "client.key"),
            ])),
            Err(ConfigError::Missing("FORWARD_MQTT_CA_PATH"))
        );
    }

    #[test]
    fn missing_certificate_file_fails_option_building() {
        let config = BrokerConfig {
            host: "broker.local".to_string(),
            port: 8883,
            client_id: "test".to_string(),
            tls: Some(TlsFiles {
                ca: PathBuf::from("/nonexistent/envmon/root-CA.crt"),
                client_auth: None,
            }),
        };
        assert_matches!(
            config.mqtt_options(),
            Err(MqttError::TlsFile { kind: "CA certificate", .. })
        );
    }

    #[test]
    fn plain_options_use_configured_address() {
        let config = BrokerConfig {
            host: "broker.local".to_string(),
            port: 1884,
            client_id: "envmon-test".to_string(),
            tls: None,
        };
        let options = config.mqtt_options().unwrap();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.client_id(), "envmon-test");
    }

    #[tokio::test]
    async fn forwarder_stops_during_reconnect_backoff() {
        let config = BrokerConfig {
            // Port 9 is closed; the first poll fails and the driver backs off.
            host: "127.0.0.1".to_string(),
            port: 9,
            client_id: "envmon-test".to_string(),
            tls: None,
        };
        let cancel = CancellationToken::new();
        let (_forwarder, handle) = MqttForwarder::start(&config, cancel.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("driver stops well before the reconnect delay")
            .unwrap();
    }
}
