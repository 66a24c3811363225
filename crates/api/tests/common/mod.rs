#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::{TimeZone, Utc};
use envmon_core::error::SinkError;
use envmon_core::reading::{ReadingStats, SensorReading};
use envmon_core::sinks::ReadingStore;
use envmon_core::types::Timestamp;
use http_body_util::BodyExt;
use tower::ServiceExt;

use envmon_api::config::ServerConfig;
use envmon_api::router::build_app_router;
use envmon_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: "postgres://unused".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        static_dir: PathBuf::from("/nonexistent/envmon-static"),
    }
}

/// Build the full application router over `store`, with the same middleware
/// stack production uses.
pub fn build_test_app(store: Arc<dyn ReadingStore>) -> Router {
    build_test_app_with(store, test_config())
}

pub fn build_test_app_with(store: Arc<dyn ReadingStore>, config: ServerConfig) -> Router {
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Issue a GET request against the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// `2024-03-01T<hour>:00:00Z`.
pub fn at_hour(hour: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

pub fn reading(temperature: f64, light: f64, alert: bool, timestamp: Timestamp) -> SensorReading {
    SensorReading {
        temperature,
        light,
        accel_x: 0.0,
        accel_y: 0.0,
        accel_z: 1.0,
        alert,
        timestamp,
    }
}

/// A store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl ReadingStore for BrokenStore {
    async fn save(&self, _: &SensorReading) -> Result<(), SinkError> {
        Err(SinkError::Storage("connection refused".into()))
    }
    async fn latest(&self) -> Result<Option<SensorReading>, SinkError> {
        Err(SinkError::Storage("connection refused".into()))
    }
    async fn range(&self, _: Timestamp, _: Timestamp) -> Result<Vec<SensorReading>, SinkError> {
        Err(SinkError::Storage("connection refused".into()))
    }
    async fn alerts(&self) -> Result<Vec<SensorReading>, SinkError> {
        Err(SinkError::Storage("connection refused".into()))
    }
    async fn aggregate(&self) -> Result<ReadingStats, SinkError> {
        Err(SinkError::Storage("connection refused".into()))
    }
    async fn ping(&self) -> Result<(), SinkError> {
        Err(SinkError::Storage("connection refused".into()))
    }
}
