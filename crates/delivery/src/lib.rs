//! Outbound delivery for the environment monitor.
//!
//! Notification channels implementing
//! [`Notifier`](envmon_core::sinks::Notifier):
//!
//! - [`SnsNotifier`] -- AWS SNS topic publish.
//! - [`EmailNotifier`] -- plain-text SMTP email via `lettre`.
//! - [`WebhookNotifier`] -- JSON POST with exponential-backoff retry.
//! - [`NotifierSet`] -- fan-out over every configured channel.
//!
//! MQTT plumbing:
//!
//! - [`mqtt::BrokerConfig`] -- broker address, client id and optional TLS
//!   material, shared with the inbound subscriber.
//! - [`MqttForwarder`] -- [`Forwarder`](envmon_core::sinks::Forwarder) that
//!   republishes readings to a second broker.

pub mod email;
pub mod fanout;
pub mod mqtt;
pub mod sns;
pub mod webhook;

pub use email::{EmailConfig, EmailNotifier};
pub use fanout::NotifierSet;
pub use mqtt::{BrokerConfig, MqttForwarder};
pub use sns::{SnsConfig, SnsNotifier};
pub use webhook::WebhookNotifier;
