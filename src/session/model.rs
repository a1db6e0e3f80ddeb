//! Identity, session and session-change event types.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Avatar shown when the identity carries none.
pub const DEFAULT_AVATAR_URL: &str = "/default-avatar.png";

/// An authenticated end-user as issued by the session provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque provider-assigned identifier.
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata set at sign-up or by a federated provider.
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
            user_metadata: serde_json::json!({}),
            app_metadata: serde_json::json!({}),
        }
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.set_metadata("full_name", name.into());
        self
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.set_metadata("avatar_url", url.into());
        self
    }

    fn set_metadata(&mut self, key: &str, value: String) {
        if !self.user_metadata.is_object() {
            self.user_metadata = serde_json::json!({});
        }
        if let Some(map) = self.user_metadata.as_object_mut() {
            map.insert(key.to_string(), serde_json::Value::String(value));
        }
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Display name: `full_name`, then `name`, then empty.
    pub fn display_name(&self) -> &str {
        self.metadata_str("full_name")
            .or_else(|| self.metadata_str("name"))
            .unwrap_or("")
    }

    pub fn email_or_empty(&self) -> &str {
        self.email.as_deref().unwrap_or("")
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.metadata_str("avatar_url")
    }

    /// Federated provider the identity signed in with (`email` for passwords).
    pub fn auth_provider(&self) -> Option<&str> {
        self.app_metadata.get("provider").and_then(|v| v.as_str())
    }
}

/// What the navbar shows for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySummary {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: String,
}

impl From<&Identity> for IdentitySummary {
    fn from(identity: &Identity) -> Self {
        let name = identity.display_name();
        Self {
            id: identity.id.clone(),
            name: (!name.is_empty()).then(|| name.to_string()),
            email: identity.email.clone(),
            avatar_url: identity
                .avatar_url()
                .unwrap_or(DEFAULT_AVATAR_URL)
                .to_string(),
        }
    }
}

/// A live session: tokens plus the identity they belong to.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Identity,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        user: Identity,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            expires_at,
            user,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Session-change notification pushed by the provider.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

impl AuthEvent {
    /// The session after this event, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(s) | Self::TokenRefreshed(s) => Some(s),
            Self::SignedOut => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::SignedOut => "signed_out",
        }
    }
}

/// Email/password pair submitted to the provider.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Federated identity providers offered on the sign-in screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            other => Err(format!("Unsupported sign-in provider: {other}")),
        }
    }
}

/// Proof that an identity has an active session.
///
/// Only obtainable from a [`Session`] or from the session context, so code
/// that takes one never has to deal with a missing user id.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedIdentity {
    identity: Identity,
}

impl AuthenticatedIdentity {
    pub fn from_session(session: &Session) -> Self {
        Self {
            identity: session.user.clone(),
        }
    }

    pub(crate) fn from_identity(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn name(&self) -> &str {
        self.identity.display_name()
    }

    pub fn email(&self) -> &str {
        self.identity.email_or_empty()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_full_name() {
        let identity: Identity = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": "a@b.co",
            "user_metadata": { "full_name": "Asha Rao", "name": "asha" }
        }))
        .unwrap();
        assert_eq!(identity.display_name(), "Asha Rao");
    }

    #[test]
    fn display_name_falls_back_to_name_then_empty() {
        let identity: Identity = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "user_metadata": { "name": "asha" }
        }))
        .unwrap();
        assert_eq!(identity.display_name(), "asha");

        let bare: Identity = serde_json::from_value(serde_json::json!({ "id": "u2" })).unwrap();
        assert_eq!(bare.display_name(), "");
        assert_eq!(bare.email_or_empty(), "");
    }

    #[test]
    fn summary_uses_default_avatar() {
        let identity = Identity::new("u1", "a@b.co");
        let summary = IdentitySummary::from(&identity);
        assert_eq!(summary.avatar_url, DEFAULT_AVATAR_URL);
        assert_eq!(summary.name, None);

        let identity = identity
            .with_full_name("Ravi")
            .with_avatar_url("https://cdn.example/r.png");
        let summary = IdentitySummary::from(&identity);
        assert_eq!(summary.avatar_url, "https://cdn.example/r.png");
        assert_eq!(summary.name.as_deref(), Some("Ravi"));
    }

    #[test]
    fn event_session_is_absent_after_sign_out() {
        let session = Session::new("at", "rt", None, Identity::new("u1", "a@b.co"));
        assert!(AuthEvent::SignedIn(session).session().is_some());
        assert!(AuthEvent::SignedOut.session().is_none());
    }

    #[test]
    fn oauth_provider_parses_case_insensitively() {
        assert_eq!("Google".parse::<OAuthProvider>(), Ok(OAuthProvider::Google));
        assert_eq!("facebook".parse::<OAuthProvider>(), Ok(OAuthProvider::Facebook));
        assert!("github".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn guard_exposes_identity_fields() {
        let session = Session::new(
            "at",
            "rt",
            None,
            Identity::new("u1", "a@b.co").with_full_name("Asha"),
        );
        let guard = AuthenticatedIdentity::from_session(&session);
        assert_eq!(guard.id(), "u1");
        assert_eq!(guard.name(), "Asha");
        assert_eq!(guard.email(), "a@b.co");
    }
}
