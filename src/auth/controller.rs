//! Auth form controller: mode toggle, submission guard, and conversion of
//! provider results into notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::form::{FieldErrors, SignInForm, SignUpForm};
use crate::error::ProviderError;
use crate::notification::Notification;
use crate::onboarding::Destination;
use crate::session::{OAuthProvider, SessionProvider};

pub const SIGN_IN_SUCCESS: &str = "Signed in successfully";
pub const SIGN_UP_SUCCESS: &str = "Check your email to confirm sign-up";
pub const SIGN_OUT_SUCCESS: &str = "Signed out";
pub const OAUTH_FALLBACK_ERROR: &str = "OAuth sign-in failed.";

/// Which form is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::SignIn => Self::SignUp,
            Self::SignUp => Self::SignIn,
        }
    }
}

/// Result of a credential submission. Provider failures are already turned
/// into notifications here; nothing propagates further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The provider accepted the request.
    Accepted { notification: Notification },
    /// The provider rejected the request or could not be reached.
    Rejected { notification: Notification },
    /// Local validation failed; no request was made.
    Invalid { errors: FieldErrors },
    /// The submitted form is not the one showing; no request was made.
    WrongMode { mode: AuthMode },
    /// Another submission is still in flight.
    Busy,
    /// The form changed while the request was in flight; the response was
    /// dropped.
    Stale,
}

/// Result of starting a federated sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OAuthOutcome {
    /// Send the browser here.
    Redirect { url: String },
    Failed { notification: Notification },
    Busy,
}

fn oauth_failure(error: &ProviderError) -> Notification {
    let message = error.user_message();
    if message.trim().is_empty() {
        Notification::error(OAUTH_FALLBACK_ERROR)
    } else {
        Notification::error(message)
    }
}

/// Releases the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives the sign-in / sign-up screen.
///
/// One submission at a time: while a request is outstanding, every other
/// submission answers `Busy`. Toggling the mode is still allowed and bumps a
/// generation counter; a response that comes back for an older generation is
/// reported as `Stale` and produces no notification.
pub struct AuthFormController {
    provider: Arc<dyn SessionProvider>,
    site_url: String,
    mode: RwLock<AuthMode>,
    generation: AtomicU64,
    in_flight: AtomicBool,
}

impl AuthFormController {
    pub fn new(provider: Arc<dyn SessionProvider>, site_url: impl Into<String>) -> Self {
        Self {
            provider,
            site_url: site_url.into().trim_end_matches('/').to_string(),
            mode: RwLock::new(AuthMode::default()),
            generation: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn mode(&self) -> AuthMode {
        *self.mode.read().await
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Switch between sign-in and sign-up. Both forms reset, so any response
    /// still in flight is for a form that no longer exists.
    pub async fn toggle_mode(&self) -> AuthMode {
        let mut mode = self.mode.write().await;
        *mode = mode.toggled();
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!(mode = ?*mode, "Auth mode toggled");
        *mode
    }

    /// Where federated sign-in sends the user back to.
    pub fn oauth_redirect_target(&self) -> String {
        format!("{}{}", self.site_url, Destination::Boarding.path())
    }

    fn claim(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Only the form for the current mode may submit.
    async fn require_mode(&self, expected: AuthMode) -> Result<(), SubmitOutcome> {
        let mode = self.mode().await;
        if mode == expected {
            Ok(())
        } else {
            debug!(?mode, ?expected, "Rejecting submission from a hidden form");
            Err(SubmitOutcome::WrongMode { mode })
        }
    }

    pub async fn submit_sign_in(&self, form: &SignInForm) -> SubmitOutcome {
        if let Err(outcome) = self.require_mode(AuthMode::SignIn).await {
            return outcome;
        }
        let credentials = match form.validate() {
            Ok(credentials) => credentials,
            Err(errors) => return SubmitOutcome::Invalid { errors },
        };
        let Some(_guard) = self.claim() else {
            return SubmitOutcome::Busy;
        };
        let generation = self.generation.load(Ordering::SeqCst);

        let result = self.provider.sign_in_with_password(&credentials).await;
        if !self.is_current(generation) {
            debug!("Discarding sign-in response for a reset form");
            return SubmitOutcome::Stale;
        }

        match result {
            Ok(session) => {
                info!(user_id = %session.user.id, "Sign-in accepted");
                SubmitOutcome::Accepted {
                    notification: Notification::success(SIGN_IN_SUCCESS),
                }
            }
            Err(e) => {
                warn!(error = %e, "Sign-in rejected");
                SubmitOutcome::Rejected {
                    notification: Notification::error(e.user_message()),
                }
            }
        }
    }

    pub async fn submit_sign_up(&self, form: &SignUpForm) -> SubmitOutcome {
        if let Err(outcome) = self.require_mode(AuthMode::SignUp).await {
            return outcome;
        }
        let valid = match form.validate() {
            Ok(valid) => valid,
            Err(errors) => return SubmitOutcome::Invalid { errors },
        };
        let Some(_guard) = self.claim() else {
            return SubmitOutcome::Busy;
        };
        let generation = self.generation.load(Ordering::SeqCst);

        let result = self
            .provider
            .sign_up(&valid.credentials, Some(valid.full_name.as_str()))
            .await;
        if !self.is_current(generation) {
            debug!("Discarding sign-up response for a reset form");
            return SubmitOutcome::Stale;
        }

        match result {
            Ok(()) => {
                info!(email = %valid.credentials.email, "Sign-up accepted");
                SubmitOutcome::Accepted {
                    notification: Notification::success(SIGN_UP_SUCCESS),
                }
            }
            Err(e) => {
                warn!(error = %e, "Sign-up rejected");
                SubmitOutcome::Rejected {
                    notification: Notification::error(e.user_message()),
                }
            }
        }
    }

    /// Begin federated sign-in; the provider returns the user to `/boarding`.
    /// Available in either mode.
    pub async fn start_oauth(&self, provider: OAuthProvider) -> OAuthOutcome {
        let Some(_guard) = self.claim() else {
            return OAuthOutcome::Busy;
        };

        let redirect_to = self.oauth_redirect_target();
        match self.provider.sign_in_with_oauth(provider, &redirect_to).await {
            Ok(url) => OAuthOutcome::Redirect {
                url: url.to_string(),
            },
            Err(e) => {
                warn!(%provider, error = %e, "Federated sign-in could not start");
                OAuthOutcome::Failed {
                    notification: oauth_failure(&e),
                }
            }
        }
    }

    /// Finish federated sign-in with the code the provider redirected back with.
    ///
    /// Federated sign-in is offered in both modes and does not belong to
    /// either form, so toggling the mode never makes its result stale.
    pub async fn complete_oauth(&self, auth_code: &str) -> SubmitOutcome {
        let Some(_guard) = self.claim() else {
            return SubmitOutcome::Busy;
        };

        match self.provider.exchange_code_for_session(auth_code).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "Federated sign-in accepted");
                SubmitOutcome::Accepted {
                    notification: Notification::success(SIGN_IN_SUCCESS),
                }
            }
            Err(e) => {
                warn!(error = %e, "Federated sign-in rejected");
                SubmitOutcome::Rejected {
                    notification: oauth_failure(&e),
                }
            }
        }
    }

    pub async fn sign_out(&self) -> SubmitOutcome {
        let Some(_guard) = self.claim() else {
            return SubmitOutcome::Busy;
        };

        match self.provider.sign_out().await {
            Ok(()) => SubmitOutcome::Accepted {
                notification: Notification::info(SIGN_OUT_SUCCESS),
            },
            Err(e) => {
                warn!(error = %e, "Sign-out failed");
                SubmitOutcome::Rejected {
                    notification: Notification::error(e.user_message()),
                }
            }
        }
    }
}
