//! REST endpoints for the onboarding form.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::flow::OnboardingFlow;
use super::model::{RoleChoice, ServiceType};
use crate::error::OnboardingError;
use crate::session::{ProfileStore, SessionContext};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub session: SessionContext,
    pub store: Arc<dyn ProfileStore>,
    pub flow: Arc<Mutex<Option<OnboardingFlow>>>,
}

impl OnboardingRouteState {
    pub fn new(session: SessionContext, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            session,
            store,
            flow: Arc::new(Mutex::new(None)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleBody {
    role: RoleChoice,
}

#[derive(Debug, Deserialize)]
struct ServiceBody {
    #[serde(alias = "serviceType")]
    service_type: ServiceType,
}

fn error_response(err: OnboardingError) -> Response {
    let (status, message) = match &err {
        OnboardingError::Validation(message) => {
            (StatusCode::UNPROCESSABLE_ENTITY, message.clone())
        }
        OnboardingError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        OnboardingError::WrongStep { .. } | OnboardingError::AlreadyCompleted => {
            (StatusCode::CONFLICT, err.to_string())
        }
        OnboardingError::Persist(source) => (StatusCode::BAD_GATEWAY, source.user_message()),
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn not_started() -> Response {
    (
        StatusCode::CONFLICT,
        Json(serde_json::json!({ "error": "Onboarding has not been started" })),
    )
        .into_response()
}

fn flow_json(flow: &OnboardingFlow) -> Json<serde_json::Value> {
    let state = flow.state();
    Json(serde_json::json!({
        "step": state.step,
        "step_index": state.step.index(),
        "role": state.role,
        "service_type": state.service_type,
        "completed": flow.is_completed(),
    }))
}

/// Lock the active flow, provided its owner is still signed in. A flow
/// whose owner signed out is discarded.
async fn active_flow(
    state: &OnboardingRouteState,
) -> Result<MappedMutexGuard<'_, OnboardingFlow>, Response> {
    let current = state.session.authenticated().await;
    let mut slot = state.flow.lock().await;

    let owner_signed_in = match slot.as_ref() {
        None => return Err(not_started()),
        Some(flow) => current
            .as_ref()
            .is_some_and(|identity| identity.id() == flow.identity().id()),
    };
    if !owner_signed_in {
        tracing::info!("Discarding onboarding flow after sign-out");
        *slot = None;
        return Err(error_response(OnboardingError::Unauthenticated));
    }

    MutexGuard::try_map(slot, Option::as_mut).map_err(|_| not_started())
}

/// POST /api/onboarding/start
///
/// Begins a fresh flow for the signed-in user. 401 without a session.
async fn start(State(state): State<OnboardingRouteState>) -> Response {
    let Some(identity) = state.session.authenticated().await else {
        return error_response(OnboardingError::Unauthenticated);
    };

    let flow = OnboardingFlow::new(identity, Arc::clone(&state.store));
    let body = flow_json(&flow);
    *state.flow.lock().await = Some(flow);
    body.into_response()
}

/// GET /api/onboarding/state
async fn get_state(State(state): State<OnboardingRouteState>) -> Response {
    match active_flow(&state).await {
        Ok(flow) => flow_json(&flow).into_response(),
        Err(response) => response,
    }
}

/// POST /api/onboarding/role
async fn select_role(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<RoleBody>,
) -> Response {
    let mut flow = match active_flow(&state).await {
        Ok(flow) => flow,
        Err(response) => return response,
    };
    match flow.select_role(body.role) {
        Ok(()) => flow_json(&flow).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/onboarding/service
async fn select_service(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<ServiceBody>,
) -> Response {
    let mut flow = match active_flow(&state).await {
        Ok(flow) => flow,
        Err(response) => return response,
    };
    match flow.select_service_type(body.service_type) {
        Ok(()) => flow_json(&flow).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/onboarding/next
///
/// Advances the flow. On completion the body carries the written record
/// and the destination path.
async fn next(State(state): State<OnboardingRouteState>) -> Response {
    let mut flow = match active_flow(&state).await {
        Ok(flow) => flow,
        Err(response) => return response,
    };
    match flow.next().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/onboarding/back
async fn back(State(state): State<OnboardingRouteState>) -> Response {
    let mut flow = match active_flow(&state).await {
        Ok(flow) => flow,
        Err(response) => return response,
    };
    match flow.back() {
        Ok(_) => flow_json(&flow).into_response(),
        Err(e) => error_response(e),
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/start", post(start))
        .route("/api/onboarding/state", get(get_state))
        .route("/api/onboarding/role", post(select_role))
        .route("/api/onboarding/service", post(select_service))
        .route("/api/onboarding/next", post(next))
        .route("/api/onboarding/back", post(back))
        .with_state(state)
}
