//! Supabase-compatible provider: GoTrue auth endpoints plus a PostgREST
//! upsert for profile records.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::model::{AuthEvent, Credentials, Identity, OAuthProvider, Session};
use super::provider::{ProfileStore, SessionCell, SessionProvider};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::onboarding::{PROFILE_COLUMNS, PROFILE_TABLE, ProfileRecord};

/// PKCE verifier length (GoTrue accepts 43..=128).
const CODE_VERIFIER_LEN: usize = 64;

/// HTTP client for a hosted Supabase project.
pub struct SupabaseClient {
    base_url: String,
    anon_key: SecretString,
    client: reqwest::Client,
    session: SessionCell,
    /// Verifier for the federated sign-in currently in progress.
    code_verifier: Mutex<Option<String>>,
}

impl SupabaseClient {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            client: reqwest::Client::new(),
            session: SessionCell::new(),
            code_verifier: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(path))
            .header("apikey", self.anon_key.expose_secret())
    }

    /// Send a request, turning transport failures and non-2xx answers into
    /// `ProviderError`s.
    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        debug!(endpoint = path, status = status.as_u16(), %message, "Provider returned error");
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, ProviderError> {
        let path = "/auth/v1/token";
        let request = self
            .request(Method::POST, path)
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let response = self.send(path, request).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(token.into_session(Utc::now()))
    }

    /// Bearer for data requests: the user's access token, refreshed first if
    /// it has expired, or the anon key when nobody is signed in.
    async fn data_bearer(&self) -> String {
        match self.get_session().await {
            Some(session) => session.access_token.expose_secret().to_string(),
            None => self.anon_key.expose_secret().to_string(),
        }
    }
}

#[async_trait]
impl SessionProvider for SupabaseClient {
    async fn get_session(&self) -> Option<Session> {
        let session = self.session.current().await?;
        if !session.is_expired(Utc::now()) {
            return Some(session);
        }

        debug!(user_id = %session.user.id, "Session expired, refreshing");
        match self.refresh_session().await {
            Ok(refreshed) => Some(refreshed),
            Err(e) => {
                warn!(error = %e, "Session refresh failed, signing out locally");
                self.session.publish(AuthEvent::SignedOut).await;
                None
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.subscribe()
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        full_name: Option<&str>,
    ) -> Result<(), ProviderError> {
        let path = "/auth/v1/signup";
        let mut body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password.expose_secret(),
        });
        if let Some(name) = full_name {
            body["data"] = serde_json::json!({ "full_name": name });
        }

        let response = self
            .send(path, self.request(Method::POST, path).json(&body))
            .await?;
        let value: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                })?;

        // Projects with email confirmation disabled answer with a session
        if value.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                })?;
            let session = token.into_session(Utc::now());
            info!(user_id = %session.user.id, "Signed up with immediate session");
            self.session.publish(AuthEvent::SignedIn(session)).await;
        } else {
            info!(email = %credentials.email, "Signed up, awaiting email confirmation");
        }
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        let session = self
            .token_grant(
                "password",
                serde_json::json!({
                    "email": credentials.email,
                    "password": credentials.password.expose_secret(),
                }),
            )
            .await?;
        info!(user_id = %session.user.id, "Signed in with password");
        self.session
            .publish(AuthEvent::SignedIn(session.clone()))
            .await;
        Ok(session)
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<Url, ProviderError> {
        let verifier = generate_code_verifier();
        let url = Url::parse_with_params(
            &self.endpoint("/auth/v1/authorize"),
            &[
                ("provider", provider.as_str()),
                ("redirect_to", redirect_to),
                ("code_challenge", verifier.as_str()),
                ("code_challenge_method", "plain"),
            ],
        )
        .map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;

        *self.code_verifier.lock().await = Some(verifier);
        info!(%provider, redirect_to, "Federated sign-in started");
        Ok(url)
    }

    async fn exchange_code_for_session(&self, auth_code: &str) -> Result<Session, ProviderError> {
        let verifier = self
            .code_verifier
            .lock()
            .await
            .take()
            .ok_or(ProviderError::NoPendingOAuth)?;

        let session = self
            .token_grant(
                "pkce",
                serde_json::json!({
                    "auth_code": auth_code,
                    "code_verifier": verifier,
                }),
            )
            .await?;
        info!(
            user_id = %session.user.id,
            provider = session.user.auth_provider().unwrap_or("unknown"),
            "Federated sign-in completed"
        );
        self.session
            .publish(AuthEvent::SignedIn(session.clone()))
            .await;
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Session, ProviderError> {
        let current = self
            .session
            .current()
            .await
            .ok_or(ProviderError::NoSession)?;

        let session = self
            .token_grant(
                "refresh_token",
                serde_json::json!({
                    "refresh_token": current.refresh_token.expose_secret(),
                }),
            )
            .await?;
        debug!(user_id = %session.user.id, "Session refreshed");
        self.session
            .publish(AuthEvent::TokenRefreshed(session.clone()))
            .await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let Some(session) = self.session.current().await else {
            return Ok(());
        };

        let path = "/auth/v1/logout";
        let request = self
            .request(Method::POST, path)
            .bearer_auth(session.access_token.expose_secret());
        let result = self.send(path, request).await;

        // The local session is gone whatever the server says
        self.session.publish(AuthEvent::SignedOut).await;
        info!(user_id = %session.user.id, "Signed out");

        match result {
            Ok(_) | Err(ProviderError::Api {
                status: 401 | 404, ..
            }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), ProviderError> {
        let path = format!("/rest/v1/{PROFILE_TABLE}");
        // `columns` makes keys absent from the body (service_type for plain
        // users) reset to NULL on conflict instead of keeping the old value.
        let request = self
            .request(Method::POST, &path)
            .query(&[("on_conflict", "id"), ("columns", PROFILE_COLUMNS)])
            .bearer_auth(self.data_bearer().await)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record);
        self.send(&path, request).await?;
        info!(user_id = %record.id, role = %record.role.choice(), "Profile upserted");
        Ok(())
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        Session::new(self.access_token, self.refresh_token, expires_at, self.user)
    }
}

/// Error body shapes used by GoTrue and PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.msg.or(b.error_description).or(b.message).or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

fn generate_code_verifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_VERIFIER_LEN)
        .map(char::from)
        .collect()
}
