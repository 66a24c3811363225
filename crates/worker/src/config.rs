use std::time::Duration;

use envmon_core::env::{self, Lookup};
use envmon_core::error::ConfigError;
use envmon_core::thresholds::ThresholdSet;
use envmon_delivery::{BrokerConfig, EmailConfig, SnsConfig};
use envmon_pipeline::ingest::{DEFAULT_FORWARD_TOPIC, DEFAULT_SINK_TIMEOUT};
use envmon_pipeline::PipelineConfig;

/// Topic the worker subscribes to by default.
pub const DEFAULT_INBOUND_TOPIC: &str = "envmonitor/data";

/// Prefix for the generated inbound client id.
const CLIENT_ID_PREFIX: &str = "envmon-worker";

const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_MAX_IN_FLIGHT: usize = 1;

/// Everything the worker needs at startup, resolved once.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Broker carrying inbound sensor readings.
    pub inbound: BrokerConfig,
    pub inbound_topic: String,
    /// Broker that receives forwarded readings.
    pub forward: BrokerConfig,
    pub pipeline: PipelineConfig,
    pub thresholds: ThresholdSet,
    pub sns: Option<SnsConfig>,
    pub email: Option<EmailConfig>,
    pub webhook_url: Option<String>,
    /// Bounded queue between the subscriber and the dispatcher.
    pub queue_capacity: usize,
    /// Messages processed concurrently; `1` keeps arrival order.
    pub max_in_flight: usize,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env::process_env)
    }

    /// Load configuration from an arbitrary lookup.
    ///
    /// | Variable                | Default                     |
    /// |-------------------------|-----------------------------|
    /// | `DATABASE_URL`          | required                    |
    /// | `MQTT_TOPIC`            | `envmonitor/data`           |
    /// | `FORWARD_TOPIC`         | `envmonitor/data`           |
    /// | `INGEST_QUEUE_CAPACITY` | `256`                       |
    /// | `INGEST_MAX_IN_FLIGHT`  | `1`                         |
    /// | `SINK_TIMEOUT_SECS`     | `30`                        |
    ///
    /// Broker, threshold and channel variables are documented on
    /// [`BrokerConfig`], [`ThresholdSet::from_lookup`], [`SnsConfig`] and
    /// [`EmailConfig`]. At least one of SNS, email or `ALERT_WEBHOOK_URL`
    /// must be configured.
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let database_url = env::required(lookup, "DATABASE_URL")?;
        let inbound = BrokerConfig::inbound_from_lookup(lookup, CLIENT_ID_PREFIX)?;
        let forward = BrokerConfig::forward_from_lookup(lookup)?;

        let sns = SnsConfig::from_lookup(lookup);
        let email = EmailConfig::from_lookup(lookup)?;
        let webhook_url = env::optional(lookup, "ALERT_WEBHOOK_URL");
        if sns.is_none() && email.is_none() && webhook_url.is_none() {
            return Err(ConfigError::Missing(
                "SNS_TOPIC_ARN, SMTP_HOST or ALERT_WEBHOOK_URL",
            ));
        }

        let sink_timeout_secs =
            env::parse_or(lookup, "SINK_TIMEOUT_SECS", DEFAULT_SINK_TIMEOUT.as_secs())?;
        if sink_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SINK_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            inbound,
            inbound_topic: env::optional(lookup, "MQTT_TOPIC")
                .unwrap_or_else(|| DEFAULT_INBOUND_TOPIC.to_string()),
            forward,
            pipeline: PipelineConfig {
                forward_topic: env::optional(lookup, "FORWARD_TOPIC")
                    .unwrap_or_else(|| DEFAULT_FORWARD_TOPIC.to_string()),
                sink_timeout: Duration::from_secs(sink_timeout_secs),
            },
            thresholds: ThresholdSet::from_lookup(lookup)?,
            sns,
            email,
            webhook_url,
            queue_capacity: env::parse_or(lookup, "INGEST_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?
                .max(1),
            max_in_flight: env::parse_or(lookup, "INGEST_MAX_IN_FLIGHT", DEFAULT_MAX_IN_FLIGHT)?
                .max(1),
        })
    }

    /// Names of the configured notification channels, for startup logs.
    pub fn channel_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.sns.is_some() {
            names.push("sns");
        }
        if self.email.is_some() {
            names.push("email");
        }
        if self.webhook_url.is_some() {
            names.push("webhook");
        }
        names
    }
}
