//! Handlers for the reading endpoints consumed by the dashboard.
//!
//! Responses are plain JSON values (no envelope): a reading, a list of
//! readings newest first, or the aggregate statistics.

use axum::extract::{Query, State};
use axum::Json;
use envmon_core::reading::{ReadingStats, SensorReading};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::query::RangeParams;
use crate::state::AppState;

const FETCH_DATA_FAILED: &str = "Error fetching data";
const FETCH_ALERTS_FAILED: &str = "Error fetching alerts";
const STATS_FAILED: &str = "Error calculating statistics";

/// Aggregate statistics as the dashboard expects them (camelCase keys).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub avg_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub avg_light: Option<f64>,
    pub alert_count: i64,
}

impl From<ReadingStats> for StatsResponse {
    fn from(stats: ReadingStats) -> Self {
        Self {
            avg_temp: stats.avg_temp,
            max_temp: stats.max_temp,
            min_temp: stats.min_temp,
            avg_light: stats.avg_light,
            alert_count: stats.alert_count,
        }
    }
}

/// GET /api/data/latest -- newest reading, or `null` when nothing is stored.
pub async fn latest(State(state): State<AppState>) -> AppResult<Json<Option<SensorReading>>> {
    let reading = state
        .store
        .latest()
        .await
        .map_err(AppError::storage(FETCH_DATA_FAILED))?;
    Ok(Json(reading))
}

/// GET /api/data/range?start=&end= -- readings with `start <= timestamp <= end`.
///
/// An inverted range is not an error; it simply matches nothing.
pub async fn range(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> AppResult<Json<Vec<SensorReading>>> {
    let (start, end) = params.bounds()?;
    let readings = state
        .store
        .range(start, end)
        .await
        .map_err(AppError::storage(FETCH_DATA_FAILED))?;
    Ok(Json(readings))
}

/// GET /api/alerts -- every alerting reading, newest first.
pub async fn alerts(State(state): State<AppState>) -> AppResult<Json<Vec<SensorReading>>> {
    let readings = state
        .store
        .alerts()
        .await
        .map_err(AppError::storage(FETCH_ALERTS_FAILED))?;
    Ok(Json(readings))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let stats = state
        .store
        .aggregate()
        .await
        .map_err(AppError::storage(STATS_FAILED))?;
    Ok(Json(stats.into()))
}
