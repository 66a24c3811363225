//! Email notification delivery via SMTP.
//!
//! [`EmailNotifier`] wraps the `lettre` async SMTP transport to send plain-text
//! alert emails. Configuration is loaded from environment variables; if
//! `SMTP_HOST` is not set, [`EmailConfig::from_lookup`] returns `None` and no
//! mailer should be constructed.

use async_trait::async_trait;
use envmon_core::env::{self, Lookup};
use envmon_core::error::{ConfigError, SinkError};
use envmon_core::sinks::Notifier;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

impl From<EmailError> for SinkError {
    fn from(err: EmailError) -> Self {
        SinkError::Notification(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "envmon@localhost";

/// Configuration for the SMTP email channel.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" mailbox.
    pub from_address: Mailbox,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Alert recipients.
    pub recipients: Vec<Mailbox>,
}

impl EmailConfig {
    /// Load configuration from the given lookup.
    ///
    /// Returns `Ok(None)` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped. When it is set,
    /// `ALERT_EMAIL_TO` must name at least one recipient, and every address
    /// (including `SMTP_FROM`) must parse as a mailbox.
    ///
    /// | Variable         | Required | Default             |
    /// |------------------|----------|---------------------|
    /// | `SMTP_HOST`      | yes      | -                   |
    /// | `SMTP_PORT`      | no       | `587`               |
    /// | `SMTP_FROM`      | no       | `envmon@localhost`  |
    /// | `SMTP_USER`      | no       | -                   |
    /// | `SMTP_PASSWORD`  | no       | -                   |
    /// | `ALERT_EMAIL_TO` | yes      | - (comma-separated) |
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = env::optional(lookup, "SMTP_HOST") else {
            return Ok(None);
        };

        let recipients = env::list(lookup, "ALERT_EMAIL_TO")
            .iter()
            .map(|raw| parse_mailbox("ALERT_EMAIL_TO", raw))
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(ConfigError::Missing("ALERT_EMAIL_TO"));
        }

        let from_raw =
            env::optional(lookup, "SMTP_FROM").unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string());

        Ok(Some(Self {
            smtp_host,
            smtp_port: env::parse_or(lookup, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            from_address: parse_mailbox("SMTP_FROM", &from_raw)?,
            smtp_user: env::optional(lookup, "SMTP_USER"),
            smtp_password: env::optional(lookup, "SMTP_PASSWORD"),
            recipients,
        }))
    }
}

fn parse_mailbox(key: &'static str, raw: &str) -> Result<Mailbox, ConfigError> {
    raw.parse().map_err(|e: lettre::address::AddressError| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// EmailNotifier
// ---------------------------------------------------------------------------

/// Sends alert emails to every configured recipient via SMTP.
pub struct EmailNotifier {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    /// Build the SMTP transport for the given configuration.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: transport_builder.build(),
            config,
        })
    }

    fn build_message(&self, to: &Mailbox, subject: &str, body: &str) -> Result<Message, EmailError> {
        Message::builder()
            .from(self.config.from_address.clone())
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    /// Mails every recipient. Succeeds when at least one delivery succeeds.
    async fn send(&self, body: &str, subject: &str) -> Result<(), SinkError> {
        let mut failures = Vec::new();
        for to in &self.config.recipients {
            let result = match self.build_message(to, subject, body) {
                Ok(email) => self.mailer.send(email).await.map(|_| ()).map_err(EmailError::from),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => tracing::info!(to = %to, subject, "Alert email sent"),
                Err(e) => {
                    tracing::warn!(to = %to, error = %e, "Alert email failed");
                    failures.push(format!("{to}: {e}"));
                }
            }
        }

        if failures.len() == self.config.recipients.len() {
            return Err(SinkError::Notification(failures.join("; ")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
