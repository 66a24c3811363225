use envmon_core::error::ConfigError;
use envmon_delivery::email::EmailError;
use envmon_delivery::mqtt::MqttError;
use envmon_delivery::webhook::WebhookError;

/// Fatal startup errors. Any of these stops the process with a non-zero
/// exit code before the subscriber is started.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("MQTT setup failed: {0}")]
    Mqtt(#[from] MqttError),

    #[error("Email channel setup failed: {0}")]
    Email(#[from] EmailError),

    #[error("Webhook channel setup failed: {0}")]
    Webhook(#[from] WebhookError),
}
