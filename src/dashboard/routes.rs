//! REST endpoints for the dashboard page.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::model::{Dashboard, LocationReport, LocationStatus};

/// Shared state for dashboard routes.
#[derive(Clone, Default)]
pub struct DashboardRouteState {
    pub location: Arc<RwLock<LocationStatus>>,
}

/// GET /api/dashboard
async fn get_dashboard(State(state): State<DashboardRouteState>) -> impl IntoResponse {
    let location = state.location.read().await.clone();
    Json(Dashboard::new(location))
}

/// POST /api/location
///
/// Records the result of the browser's geolocation call. The first report
/// is final; the page never asks again.
async fn report_location(
    State(state): State<DashboardRouteState>,
    Json(report): Json<LocationReport>,
) -> impl IntoResponse {
    let status = LocationStatus::from_report(&report);
    match &status {
        LocationStatus::Located { .. } => debug!("Location received"),
        _ => info!(?report, "Location unavailable"),
    }
    *state.location.write().await = status.clone();
    Json(status)
}

/// POST /api/requests
///
/// Requesting a service has no backend yet.
async fn request_service() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(serde_json::json!({ "error": "Service requests are not implemented" })),
    )
}

/// Build the dashboard REST routes.
pub fn dashboard_routes(state: DashboardRouteState) -> Router {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/location", post(report_location))
        .route("/api/requests", post(request_service))
        .with_state(state)
}
