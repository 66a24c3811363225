use axum::routing::get;
use axum::Router;

use crate::handlers::readings;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/data/latest", get(readings::latest))
        .route("/data/range", get(readings::range))
        .route("/alerts", get(readings::alerts))
        .route("/stats", get(readings::stats))
}
