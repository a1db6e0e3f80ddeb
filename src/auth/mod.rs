//! Sign-in / sign-up: form validation, the submission controller, and its
//! REST routes.

pub mod controller;
pub mod form;
pub mod routes;

pub use controller::{AuthFormController, AuthMode, OAuthOutcome, SubmitOutcome};
pub use form::{FieldErrors, SignInForm, SignUpForm, ValidSignUp, is_valid_email};
pub use routes::{AuthRouteState, auth_routes};
