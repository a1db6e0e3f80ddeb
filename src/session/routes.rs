//! REST endpoint exposing the signed-in identity to the navbar.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::model::IdentitySummary;
use super::observer::SessionContext;

/// Shared state for session routes.
#[derive(Clone)]
pub struct SessionRouteState {
    pub session: SessionContext,
}

/// GET /api/session
///
/// Returns the current identity's summary, or `null` when signed out.
async fn get_session(State(state): State<SessionRouteState>) -> impl IntoResponse {
    let summary = state
        .session
        .current()
        .await
        .as_ref()
        .map(IdentitySummary::from);
    Json(summary)
}

/// Build the session REST routes.
pub fn session_routes(state: SessionRouteState) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .with_state(state)
}
