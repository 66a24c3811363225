//! AWS SNS notification channel.
//!
//! Publishes each alert (subject + message) to a single SNS topic.
//! Credentials come from the standard AWS provider chain
//! (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`, profile, instance role).

use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use envmon_core::env::{self, Lookup};
use envmon_core::error::SinkError;
use envmon_core::sinks::Notifier;

/// SNS limits subjects to 100 ASCII characters.
const MAX_SUBJECT_LEN: usize = 100;

/// Configuration for the SNS channel.
#[derive(Debug, Clone)]
pub struct SnsConfig {
    pub topic_arn: String,
    /// Overrides the region resolved by the AWS provider chain.
    pub region: Option<String>,
}

impl SnsConfig {
    /// Returns `None` when `SNS_TOPIC_ARN` is not set.
    ///
    /// | Variable        | Required | Default             |
    /// |-----------------|----------|---------------------|
    /// | `SNS_TOPIC_ARN` | yes      | -                   |
    /// | `AWS_REGION`    | no       | AWS provider chain  |
    pub fn from_lookup(lookup: &impl Lookup) -> Option<Self> {
        let topic_arn = env::optional(lookup, "SNS_TOPIC_ARN")?;
        Some(Self {
            topic_arn,
            region: env::optional(lookup, "AWS_REGION"),
        })
    }
}

/// Sends alerts to an SNS topic.
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsNotifier {
    /// Resolve AWS configuration and build the SNS client.
    pub async fn connect(config: SnsConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;

        Self {
            client: aws_sdk_sns::Client::new(&sdk_config),
            topic_arn: config.topic_arn,
        }
    }
}

/// Trim a subject to SNS's limit without splitting a character.
fn clamp_subject(subject: &str) -> &str {
    match subject.char_indices().nth(MAX_SUBJECT_LEN) {
        Some((idx, _)) => &subject[..idx],
        None => subject,
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn send(&self, body: &str, subject: &str) -> Result<(), SinkError> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(clamp_subject(subject))
            .message(body)
            .send()
            .await
            .map_err(|e| {
                SinkError::Notification(format!("SNS publish failed: {}", DisplayErrorContext(&e)))
            })?;

        tracing::info!(
            message_id = output.message_id().unwrap_or_default(),
            topic_arn = %self.topic_arn,
            "SNS notification sent"
        );
        Ok(())
    }
}
