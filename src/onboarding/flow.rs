//! OnboardingFlow: collects a role and, for providers, a service type, then
//! writes the profile record.
//!
//! A flow can only be built from an [`AuthenticatedIdentity`], so the id
//! used for the profile row always exists. Nothing is written until the
//! final step, and a failed write leaves the flow where it was so the user
//! can submit again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::model::{Destination, ProfileRecord, Role, RoleChoice, ServiceType};
use super::state::{OnboardingState, OnboardingStep};
use crate::error::OnboardingError;
use crate::session::{AuthenticatedIdentity, ProfileStore};

pub const ROLE_REQUIRED: &str = "Please select a role";
pub const SERVICE_TYPE_REQUIRED: &str = "Please select a service type";

/// Result of a successful `next()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowOutcome {
    /// Moved to another step; nothing was written.
    Advanced { step: OnboardingStep },
    /// The profile was written and the flow is over.
    Completed {
        record: ProfileRecord,
        destination: Destination,
    },
}

pub struct OnboardingFlow {
    identity: AuthenticatedIdentity,
    store: Arc<dyn ProfileStore>,
    state: OnboardingState,
    completed: bool,
    clock: fn() -> DateTime<Utc>,
}

impl OnboardingFlow {
    pub fn new(identity: AuthenticatedIdentity, store: Arc<dyn ProfileStore>) -> Self {
        debug!(user_id = %identity.id(), "Onboarding started");
        Self {
            identity,
            store,
            state: OnboardingState::default(),
            completed: false,
            clock: Utc::now,
        }
    }

    /// Replace the clock used for `created_at`.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &OnboardingState {
        &self.state
    }

    pub fn identity(&self) -> &AuthenticatedIdentity {
        &self.identity
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn require_step(&self, expected: OnboardingStep) -> Result<(), OnboardingError> {
        if self.completed {
            return Err(OnboardingError::AlreadyCompleted);
        }
        if self.state.step != expected {
            return Err(OnboardingError::WrongStep {
                expected,
                actual: self.state.step,
            });
        }
        Ok(())
    }

    pub fn select_role(&mut self, role: RoleChoice) -> Result<(), OnboardingError> {
        self.require_step(OnboardingStep::RoleSelection)?;
        self.state.role = Some(role);
        Ok(())
    }

    pub fn select_service_type(&mut self, service_type: ServiceType) -> Result<(), OnboardingError> {
        self.require_step(OnboardingStep::ServiceSelection)?;
        self.state.service_type = Some(service_type);
        Ok(())
    }

    /// Return to role selection, keeping every selection.
    pub fn back(&mut self) -> Result<OnboardingStep, OnboardingError> {
        self.require_step(OnboardingStep::ServiceSelection)?;
        self.state.back().map_err(|_| OnboardingError::WrongStep {
            expected: OnboardingStep::ServiceSelection,
            actual: self.state.step,
        })
    }

    /// Advance from the current step, writing the profile when the flow
    /// finishes. Validation and write failures leave the step unchanged.
    pub async fn next(&mut self) -> Result<FlowOutcome, OnboardingError> {
        if self.completed {
            return Err(OnboardingError::AlreadyCompleted);
        }

        match self.state.step {
            OnboardingStep::RoleSelection => match self.state.role {
                None => Err(OnboardingError::Validation(ROLE_REQUIRED.to_string())),
                Some(RoleChoice::User) => self.complete(Role::User).await,
                Some(RoleChoice::ServiceProvider) => {
                    let step = self
                        .state
                        .advance()
                        .map_err(OnboardingError::Validation)?;
                    Ok(FlowOutcome::Advanced { step })
                }
            },
            OnboardingStep::ServiceSelection => match self.state.service_type {
                None => Err(OnboardingError::Validation(
                    SERVICE_TYPE_REQUIRED.to_string(),
                )),
                Some(service_type) => {
                    self.complete(Role::ServiceProvider { service_type }).await
                }
            },
        }
    }

    async fn complete(&mut self, role: Role) -> Result<FlowOutcome, OnboardingError> {
        let record = ProfileRecord {
            id: self.identity.id().to_string(),
            name: self.identity.name().to_string(),
            email: self.identity.email().to_string(),
            role,
            created_at: (self.clock)(),
        };

        if let Err(e) = self.store.upsert_profile(&record).await {
            warn!(user_id = %record.id, error = %e, "Profile write failed");
            return Err(OnboardingError::Persist(e));
        }

        self.completed = true;
        let destination = role.destination();
        info!(
            user_id = %record.id,
            role = %role.choice(),
            destination = destination.path(),
            "Onboarding completed"
        );
        Ok(FlowOutcome::Completed {
            record,
            destination,
        })
    }
}
