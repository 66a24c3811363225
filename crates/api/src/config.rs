use std::path::PathBuf;

use axum::http::HeaderValue;
use envmon_core::env::{self, Lookup};
use envmon_core::error::ConfigError;

/// Server configuration loaded from environment variables.
///
/// Everything except `DATABASE_URL` has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory with the dashboard's static files (default: `public`).
    pub static_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env::process_env)
    }

    /// Load configuration with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `DATABASE_URL`         | required                   |
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `STATIC_DIR`           | `public`                   |
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let mut cors_origins = env::list(lookup, "CORS_ORIGINS");
        if cors_origins.is_empty() {
            cors_origins.push("http://localhost:3000".to_string());
        }
        for origin in &cors_origins {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
                key: "CORS_ORIGINS",
                value: origin.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Self {
            database_url: env::required(lookup, "DATABASE_URL")?,
            host: env::optional(lookup, "HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: env::parse_or(lookup, "PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env::parse_or(lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            static_dir: env::optional(lookup, "STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
        })
    }
}
