//! REST endpoints for the sign-in / sign-up screen.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::controller::{AuthFormController, OAuthOutcome, SubmitOutcome};
use super::form::{SignInForm, SignUpForm};
use crate::session::OAuthProvider;

/// Shared state for auth routes.
#[derive(Clone)]
pub struct AuthRouteState {
    pub controller: Arc<AuthFormController>,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    code: String,
}

fn submit_response(outcome: SubmitOutcome) -> Response {
    let status = match &outcome {
        SubmitOutcome::Accepted { .. } => StatusCode::OK,
        SubmitOutcome::Rejected { .. } => StatusCode::BAD_GATEWAY,
        SubmitOutcome::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitOutcome::WrongMode { .. } | SubmitOutcome::Busy | SubmitOutcome::Stale => {
            StatusCode::CONFLICT
        }
    };
    (status, Json(outcome)).into_response()
}

/// GET /api/auth/mode
async fn get_mode(State(state): State<AuthRouteState>) -> impl IntoResponse {
    Json(serde_json::json!({ "mode": state.controller.mode().await }))
}

/// POST /api/auth/mode
///
/// Toggle between sign-in and sign-up. Any submission still in flight is
/// discarded when it returns.
async fn toggle_mode(State(state): State<AuthRouteState>) -> impl IntoResponse {
    Json(serde_json::json!({ "mode": state.controller.toggle_mode().await }))
}

/// POST /api/auth/signin
async fn sign_in(
    State(state): State<AuthRouteState>,
    Json(form): Json<SignInForm>,
) -> Response {
    submit_response(state.controller.submit_sign_in(&form).await)
}

/// POST /api/auth/signup
async fn sign_up(
    State(state): State<AuthRouteState>,
    Json(form): Json<SignUpForm>,
) -> Response {
    submit_response(state.controller.submit_sign_up(&form).await)
}

/// POST /api/auth/oauth/{provider}
///
/// Returns the URL the browser should navigate to.
async fn start_oauth(
    State(state): State<AuthRouteState>,
    Path(provider): Path<String>,
) -> Response {
    let provider: OAuthProvider = match provider.parse() {
        Ok(p) => p,
        Err(message) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response();
        }
    };

    let outcome = state.controller.start_oauth(provider).await;
    let status = match &outcome {
        OAuthOutcome::Redirect { .. } => StatusCode::OK,
        OAuthOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        OAuthOutcome::Busy => StatusCode::CONFLICT,
    };
    (status, Json(outcome)).into_response()
}

/// POST /api/auth/callback
///
/// Completes a federated sign-in with the code from the redirect.
async fn oauth_callback(
    State(state): State<AuthRouteState>,
    Json(body): Json<CallbackBody>,
) -> Response {
    submit_response(state.controller.complete_oauth(&body.code).await)
}

/// POST /api/auth/signout
async fn sign_out(State(state): State<AuthRouteState>) -> Response {
    submit_response(state.controller.sign_out().await)
}

/// Build the auth REST routes.
pub fn auth_routes(state: AuthRouteState) -> Router {
    Router::new()
        .route("/api/auth/mode", get(get_mode).post(toggle_mode))
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/oauth/{provider}", post(start_oauth))
        .route("/api/auth/callback", post(oauth_callback))
        .route("/api/auth/signout", post(sign_out))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::session::{Identity, InMemoryProvider};

    async fn app() -> (Arc<InMemoryProvider>, Router) {
        let provider = Arc::new(InMemoryProvider::new());
        provider
            .register(Identity::new("u1", "asha@example.com"), "hunter22")
            .await;
        let controller = Arc::new(AuthFormController::new(
            provider.clone(),
            "http://localhost:3000",
        ));
        (provider, auth_routes(AuthRouteState { controller }))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_sign_in_is_422_with_field_errors() {
        let (provider, app) = app().await;
        let response = app
            .oneshot(post_json(
                "/api/auth/signin",
                serde_json::json!({ "email": "asha@example.com", "password": "abc" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["status"], "invalid");
        assert_eq!(
            json["errors"]["password"],
            "Password must be at least 6 characters"
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn rejected_sign_in_is_502_with_notification() {
        let (_provider, app) = app().await;
        let response = app
            .oneshot(post_json(
                "/api/auth/signin",
                serde_json::json!({ "email": "asha@example.com", "password": "wrong-pass" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["notification"]["level"], "error");
        assert_eq!(json["notification"]["message"], "Invalid login credentials");
    }

    #[tokio::test]
    async fn sign_up_while_sign_in_shows_is_409() {
        let (provider, app) = app().await;
        let response = app
            .oneshot(post_json(
                "/api/auth/signup",
                serde_json::json!({
                    "name": "Ravi",
                    "email": "ravi@example.com",
                    "password": "longpassword",
                    "confirmPassword": "longpassword"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["status"], "wrong_mode");
        assert_eq!(json["mode"], "sign_in");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_oauth_provider_is_404() {
        let (_provider, app) = app().await;
        let response = app
            .oneshot(post_json("/api/auth/oauth/github", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn toggle_returns_new_mode() {
        let (_provider, app) = app().await;
        let response = app
            .oneshot(Request::post("/api/auth/mode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["mode"], "sign_up");
    }
}
