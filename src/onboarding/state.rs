//! Onboarding state machine: tracks which step the user is on and what has
//! been selected so far.

use serde::{Deserialize, Serialize};

use super::model::{RoleChoice, ServiceType};

/// The steps of the onboarding form.
///
/// Progresses RoleSelection → ServiceSelection, and only for service
/// providers. Users finish from the first step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    RoleSelection,
    ServiceSelection,
}

impl OnboardingStep {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingStep) -> bool {
        use OnboardingStep::*;
        matches!(
            (self, target),
            (RoleSelection, ServiceSelection) | (ServiceSelection, RoleSelection)
        )
    }

    /// Next step in the forward direction, if any.
    pub fn next(&self) -> Option<OnboardingStep> {
        match self {
            Self::RoleSelection => Some(Self::ServiceSelection),
            Self::ServiceSelection => None,
        }
    }

    pub fn previous(&self) -> Option<OnboardingStep> {
        match self {
            Self::RoleSelection => None,
            Self::ServiceSelection => Some(Self::RoleSelection),
        }
    }

    /// Zero-based position, as shown by the step indicator.
    pub fn index(&self) -> usize {
        match self {
            Self::RoleSelection => 0,
            Self::ServiceSelection => 1,
        }
    }
}

impl Default for OnboardingStep {
    fn default() -> Self {
        Self::RoleSelection
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RoleSelection => "role_selection",
            Self::ServiceSelection => "service_selection",
        };
        write!(f, "{s}")
    }
}

/// In-progress onboarding selections. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingState {
    pub step: OnboardingStep,
    pub role: Option<RoleChoice>,
    pub service_type: Option<ServiceType>,
}

impl OnboardingState {
    /// Move to the next step. Returns an error at the last step.
    pub fn advance(&mut self) -> Result<OnboardingStep, String> {
        let next = self
            .step
            .next()
            .ok_or_else(|| format!("No step after {}", self.step))?;
        if !self.step.can_transition_to(next) {
            return Err(format!("Cannot transition from {} to {}", self.step, next));
        }
        self.step = next;
        Ok(next)
    }

    /// Move back one step, keeping the selections made so far.
    pub fn back(&mut self) -> Result<OnboardingStep, String> {
        let previous = self
            .step
            .previous()
            .ok_or_else(|| format!("No step before {}", self.step))?;
        self.step = previous;
        Ok(previous)
    }
}
