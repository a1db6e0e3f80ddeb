//! Sign-in and sign-up form input and validation.
//!
//! Validation is purely local: a form that fails here never reaches the
//! session provider.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::Credentials;

pub const FIELD_NAME: &str = "name";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_CONFIRM_PASSWORD: &str = "confirmPassword";

const SIGN_IN_MIN_PASSWORD: usize = 6;
const SIGN_UP_MIN_PASSWORD: usize = 8;
const MIN_NAME: usize = 2;

/// Local part, `@`, dot-separated labels, alphabetic TLD of two or more.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

/// Syntactic email check.
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_PATTERN.is_match(email)
}

/// Per-field validation messages, first failure per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless the field already has one.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if !is_valid_email(email) {
        errors.add(FIELD_EMAIL, "Please enter a valid email address");
    }
}

fn check_min_len(errors: &mut FieldErrors, field: &str, value: &str, min: usize, message: &str) {
    if value.chars().count() < min {
        errors.add(field, message);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        check_min_len(
            &mut errors,
            FIELD_PASSWORD,
            &self.password,
            SIGN_IN_MIN_PASSWORD,
            "Password must be at least 6 characters",
        );
        errors.into_result(Credentials::new(&self.email, &self.password))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// A sign-up form that passed validation.
#[derive(Debug, Clone)]
pub struct ValidSignUp {
    pub credentials: Credentials,
    pub full_name: String,
}

impl SignUpForm {
    /// Validate every field. The confirmation check always runs, so a
    /// mismatch is reported alongside any other field errors.
    pub fn validate(&self) -> Result<ValidSignUp, FieldErrors> {
        let mut errors = FieldErrors::new();
        check_min_len(
            &mut errors,
            FIELD_NAME,
            &self.name,
            MIN_NAME,
            "Name must be at least 2 characters",
        );
        check_email(&mut errors, &self.email);
        check_min_len(
            &mut errors,
            FIELD_PASSWORD,
            &self.password,
            SIGN_UP_MIN_PASSWORD,
            "Password must be at least 8 characters",
        );
        if self.password != self.confirm_password {
            errors.add(FIELD_CONFIRM_PASSWORD, "Passwords don't match");
        }
        errors.into_result(ValidSignUp {
            credentials: Credentials::new(&self.email, &self.password),
            full_name: self.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        for email in [
            "asha@example.com",
            "ravi.kumar+jobs@mail.example.co.in",
            "o'neil@example.org",
            "a_b-c@sub-domain.example.io",
        ] {
            assert!(is_valid_email(email), "{email} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in [
            "",
            "asha",
            "asha@",
            "@example.com",
            "asha@example",
            "asha@example.c",
            ".asha@example.com",
            "asha..rao@example.com",
            "asha.@example.com",
            "asha@-example.com",
            "asha rao@example.com",
        ] {
            assert!(!is_valid_email(email), "{email} should be invalid");
        }
    }

    #[test]
    fn sign_in_requires_six_character_password() {
        let form = SignInForm {
            email: "asha@example.com".into(),
            password: "abc".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get(FIELD_PASSWORD),
            Some("Password must be at least 6 characters")
        );
        assert!(!errors.contains(FIELD_EMAIL));

        let form = SignInForm {
            password: "abcdef".into(),
            ..form
        };
        let credentials = form.validate().unwrap();
        assert_eq!(credentials.email, "asha@example.com");
        assert_eq!(credentials.password.expose_secret(), "abcdef");
    }

    #[test]
    fn sign_in_rejects_bad_email() {
        let form = SignInForm {
            email: "not-an-email".into(),
            password: "abcdef".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get(FIELD_EMAIL),
            Some("Please enter a valid email address")
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn sign_up_mismatch_is_attached_to_confirmation() {
        let form = SignUpForm {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password: "longpassword".into(),
            confirm_password: "longpassw0rd".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get(FIELD_CONFIRM_PASSWORD),
            Some("Passwords don't match")
        );
        assert!(!errors.contains(FIELD_PASSWORD));
    }

    #[test]
    fn sign_up_reports_every_failing_field() {
        let form = SignUpForm {
            name: "A".into(),
            email: "asha@".into(),
            password: "short".into(),
            confirm_password: "shorter".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(
            errors.get(FIELD_NAME),
            Some("Name must be at least 2 characters")
        );
        assert_eq!(
            errors.get(FIELD_PASSWORD),
            Some("Password must be at least 8 characters")
        );
    }

    #[test]
    fn sign_up_counts_characters_not_bytes() {
        let form = SignUpForm {
            name: "अ".repeat(2),
            email: "asha@example.com".into(),
            password: "पासवर्डपासवर्ड".into(),
            confirm_password: "पासवर्डपासवर्ड".into(),
        };
        let valid = form.validate().unwrap();
        assert_eq!(valid.full_name, "अअ");
    }

    #[test]
    fn sign_up_form_reads_camel_case_json() {
        let form: SignUpForm = serde_json::from_value(serde_json::json!({
            "name": "Asha",
            "email": "asha@example.com",
            "password": "longpassword",
            "confirmPassword": "longpassword"
        }))
        .unwrap();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn field_errors_keep_first_message() {
        let mut errors = FieldErrors::new();
        errors.add(FIELD_EMAIL, "first");
        errors.add(FIELD_EMAIL, "second");
        assert_eq!(errors.get(FIELD_EMAIL), Some("first"));
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({ "email": "first" })
        );
    }
}
