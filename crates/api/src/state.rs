use std::sync::Arc;

use envmon_core::sinks::ReadingStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Reading storage (PostgreSQL in production, in-memory in tests).
    pub store: Arc<dyn ReadingStore>,
    pub config: Arc<ServerConfig>,
}
