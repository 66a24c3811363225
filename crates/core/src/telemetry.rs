//! Process-level plumbing shared by every binary: log setup and shutdown
//! signals.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::env::{self, Lookup};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter`. `LOG_FORMAT=json` switches the
/// fmt layer to one JSON object per line.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json_format(&env::process_env) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Whether `LOG_FORMAT` asks for JSON lines (case-insensitive).
pub fn json_format(lookup: &impl Lookup) -> bool {
    env::optional(lookup, "LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
///
/// If a handler cannot be installed the corresponding branch never fires,
/// so the other signal still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_format_is_opt_in() {
        let unset = |_: &str| -> Option<String> { None };
        let pretty = |_: &str| -> Option<String> { Some("pretty".to_string()) };
        let json = |_: &str| -> Option<String> { Some("JSON".to_string()) };

        assert!(!json_format(&unset));
        assert!(!json_format(&pretty));
        assert!(json_format(&json));
    }
}
