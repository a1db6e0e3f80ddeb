//! Onboarding: the two-step form that records whether a new account is a
//! customer or a service provider.
//!
//! A customer finishes after picking a role. A provider also picks a service
//! type. The profile row is written once, at the end, and the user is sent
//! to the page for their role.

pub mod flow;
pub mod model;
pub mod routes;
pub mod state;

pub use flow::{FlowOutcome, OnboardingFlow};
pub use model::{
    Destination, PROFILE_COLUMNS, PROFILE_TABLE, ProfileRecord, Role, RoleChoice, ServiceType,
};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{OnboardingState, OnboardingStep};
