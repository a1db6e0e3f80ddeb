//! Assembles the JSON API router from each area's routes.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthFormController, AuthRouteState, auth_routes};
use crate::dashboard::{DashboardRouteState, dashboard_routes};
use crate::error::{ConfigError, Result};
use crate::onboarding::{OnboardingRouteState, onboarding_routes};
use crate::session::{
    ProfileStore, SessionObserver, SessionProvider, SessionRouteState, SessionSubscription,
    session_routes,
};

/// A built router plus the session listener it depends on. The listener
/// stops when this is dropped.
pub struct App {
    pub router: Router,
    pub subscription: SessionSubscription,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "karigar-online"
    }))
}

/// Build the full router over one provider that serves both sessions and
/// profile writes. Browser requests are only accepted from `site_url`.
pub async fn build_app<P>(provider: Arc<P>, site_url: &str) -> Result<App>
where
    P: SessionProvider + ProfileStore + 'static,
{
    let origin = HeaderValue::from_str(site_url).map_err(|e| ConfigError::InvalidValue {
        key: "KARIGAR_SITE_URL".to_string(),
        message: e.to_string(),
    })?;

    let sessions: Arc<dyn SessionProvider> = provider.clone();
    let store: Arc<dyn ProfileStore> = provider;

    let (session, subscription) = SessionObserver::start(Arc::clone(&sessions)).await;
    let controller = Arc::new(AuthFormController::new(sessions, site_url));

    let router = Router::new()
        .route("/health", get(health))
        .merge(session_routes(SessionRouteState {
            session: session.clone(),
        }))
        .merge(auth_routes(AuthRouteState { controller }))
        .merge(onboarding_routes(OnboardingRouteState::new(session, store)))
        .merge(dashboard_routes(DashboardRouteState::default()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    Ok(App {
        router,
        subscription,
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::error::Error;
    use crate::session::InMemoryProvider;

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(Arc::new(InMemoryProvider::new()), "http://localhost:3000")
            .await
            .unwrap();
        let response = app
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_allows_the_site_origin() {
        let app = build_app(Arc::new(InMemoryProvider::new()), "http://localhost:3000")
            .await
            .unwrap();
        let response = app
            .router
            .oneshot(
                Request::get("/api/dashboard")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn site_url_must_be_a_header_value() {
        let result = build_app(Arc::new(InMemoryProvider::new()), "http://bad\nhost").await;
        match result {
            Err(Error::Config(ConfigError::InvalidValue { key, .. })) => {
                assert_eq!(key, "KARIGAR_SITE_URL")
            }
            Err(other) => panic!("expected a config error, got {other}"),
            Ok(_) => panic!("expected a config error"),
        }
    }
}
