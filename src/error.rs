//! Error types for Karigar Online.

use crate::onboarding::OnboardingStep;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures reported by, or while talking to, the hosted session provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with an error body.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("No active session")]
    NoSession,

    #[error("No federated sign-in is in progress")]
    NoPendingOAuth,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ProviderError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Onboarding flow errors. None of these change the flow's step.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OnboardingError {
    /// A required selection is missing.
    #[error("{0}")]
    Validation(String),

    #[error("Sign in before starting onboarding")]
    Unauthenticated,

    #[error("Action not available during {actual}, expected {expected}")]
    WrongStep {
        expected: OnboardingStep,
        actual: OnboardingStep,
    },

    #[error("Onboarding already completed")]
    AlreadyCompleted,

    #[error("Failed to save profile: {0}")]
    Persist(#[source] ProviderError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
