pub mod health;
pub mod readings;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// GET /data/latest          newest reading
/// GET /data/range           readings between ?start and ?end
/// GET /alerts               alerting readings
/// GET /stats                aggregate statistics
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(readings::router())
}
