//! Fan-out over several notification channels.

use std::sync::Arc;

use async_trait::async_trait;
use envmon_core::error::SinkError;
use envmon_core::sinks::Notifier;
use futures::future::join_all;

/// Delivers each alert to every registered channel concurrently.
///
/// Succeeds when at least one channel accepted the alert. Each channel
/// failure is logged with the channel name; when every channel fails the
/// individual errors are joined into a single [`SinkError::Notification`].
#[derive(Default)]
pub struct NotifierSet {
    channels: Vec<(&'static str, Arc<dyn Notifier>)>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under a short name used in logs (`"sns"`, `"email"`).
    pub fn with_channel(mut self, name: &'static str, notifier: Arc<dyn Notifier>) -> Self {
        self.channels.push((name, notifier));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Names of the registered channels, in registration order.
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|(name, _)| *name).collect()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    async fn send(&self, body: &str, subject: &str) -> Result<(), SinkError> {
        if self.channels.is_empty() {
            return Err(SinkError::Notification(
                "no notification channels configured".to_string(),
            ));
        }

        let results = join_all(
            self.channels
                .iter()
                .map(|(_, notifier)| notifier.send(body, subject)),
        )
        .await;

        let mut failures = Vec::new();
        for ((name, _), result) in self.channels.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(channel = name, error = %e, "Notification channel failed");
                failures.push(format!("{name}: {e}"));
            }
        }

        if failures.len() == self.channels.len() {
            return Err(SinkError::Notification(failures.join("; ")));
        }
        Ok(())
    }
}
