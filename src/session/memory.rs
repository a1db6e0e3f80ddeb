//! In-process session provider for local development and tests.
//!
//! Accounts and profile rows live in memory. Every provider call is counted
//! so callers can assert that local validation kept a request off the wire,
//! and calls can be held at a gate or made to fail once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Url;
use secrecy::ExposeSecret;
use tokio::sync::{Notify, RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{AuthEvent, Credentials, Identity, OAuthProvider, Session};
use super::provider::{ProfileStore, SessionCell, SessionProvider};
use crate::error::ProviderError;
use crate::onboarding::ProfileRecord;

/// Lifetime of sessions issued by the in-memory provider.
const SESSION_TTL_MINUTES: i64 = 60;

struct Account {
    identity: Identity,
    password: String,
}

/// Provider backed by in-memory maps.
pub struct InMemoryProvider {
    session: SessionCell,
    accounts: RwLock<HashMap<String, Account>>,
    profiles: RwLock<HashMap<String, ProfileRecord>>,
    /// Identity handed out when a federated sign-in completes.
    oauth_identity: StdMutex<Option<Identity>>,
    pending_oauth: StdMutex<Option<OAuthProvider>>,
    calls: AtomicUsize,
    upserts: AtomicUsize,
    gate: StdMutex<Option<Arc<Notify>>>,
    fail_next: StdMutex<Option<ProviderError>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            session: SessionCell::new(),
            accounts: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            oauth_identity: StdMutex::new(None),
            pending_oauth: StdMutex::new(None),
            calls: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
            gate: StdMutex::new(None),
            fail_next: StdMutex::new(None),
        }
    }

    /// Identity returned by the next completed federated sign-in.
    pub fn with_oauth_identity(self, identity: Identity) -> Self {
        if let Ok(mut slot) = self.oauth_identity.lock() {
            *slot = Some(identity);
        }
        self
    }

    /// Create a confirmed account directly.
    pub async fn register(&self, identity: Identity, password: impl Into<String>) {
        let email = identity.email_or_empty().to_ascii_lowercase();
        self.accounts.write().await.insert(
            email,
            Account {
                identity,
                password: password.into(),
            },
        );
    }

    /// Start a session for `identity` without going through a sign-in.
    pub async fn start_session(&self, identity: Identity) -> Session {
        let session = issue_session(identity);
        self.session
            .publish(AuthEvent::SignedIn(session.clone()))
            .await;
        session
    }

    /// Push a session-change event as if it came from the hosted service.
    pub async fn emit(&self, event: AuthEvent) {
        self.session.publish(event).await;
    }

    /// Number of provider calls made so far (reads of the local session
    /// and subscriptions are not counted).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of profile upserts accepted so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub async fn profile(&self, id: &str) -> Option<ProfileRecord> {
        self.profiles.read().await.get(id).cloned()
    }

    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Receivers still subscribed to session changes.
    pub fn listener_count(&self) -> usize {
        self.session.listener_count()
    }

    /// Hold every subsequent call until the returned gate is notified.
    /// Each `notify_one` releases one call.
    pub fn hold_requests(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        if let Ok(mut slot) = self.gate.lock() {
            *slot = Some(Arc::clone(&gate));
        }
        gate
    }

    pub fn release_hold(&self) {
        if let Ok(mut slot) = self.gate.lock() {
            *slot = None;
        }
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: ProviderError) {
        if let Ok(mut slot) = self.fail_next.lock() {
            *slot = Some(error);
        }
    }

    /// Bookkeeping shared by every counted call.
    async fn enter(&self, operation: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(operation, "In-memory provider call");

        let gate = self.gate.lock().ok().and_then(|g| g.clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.fail_next.lock().ok().and_then(|mut f| f.take()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn issue_session(identity: Identity) -> Session {
    Session::new(
        Uuid::new_v4().to_string(),
        Uuid::new_v4().to_string(),
        Some(Utc::now() + Duration::minutes(SESSION_TTL_MINUTES)),
        identity,
    )
}

#[async_trait]
impl SessionProvider for InMemoryProvider {
    async fn get_session(&self) -> Option<Session> {
        self.session.current().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.subscribe()
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        full_name: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.enter("sign_up").await?;

        let email = credentials.email.to_ascii_lowercase();
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(ProviderError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let mut identity = Identity::new(Uuid::new_v4().to_string(), credentials.email.clone());
        if let Some(name) = full_name {
            identity = identity.with_full_name(name);
        }
        info!(user_id = %identity.id, "Account registered");
        accounts.insert(
            email,
            Account {
                identity,
                password: credentials.password.expose_secret().to_string(),
            },
        );
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError> {
        self.enter("sign_in_with_password").await?;

        let identity = {
            let accounts = self.accounts.read().await;
            accounts
                .get(&credentials.email.to_ascii_lowercase())
                .filter(|a| a.password == credentials.password.expose_secret())
                .map(|a| a.identity.clone())
        };
        let identity = identity.ok_or_else(|| ProviderError::Api {
            status: 400,
            message: "Invalid login credentials".to_string(),
        })?;

        let session = issue_session(identity);
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
        self.enter("sign_in_with_oauth").await?;

        let url = Url::parse_with_params(
            "http://memory.local/auth/v1/authorize",
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        if let Ok(mut pending) = self.pending_oauth.lock() {
            *pending = Some(provider);
        }
        Ok(url)
    }

    async fn exchange_code_for_session(&self, auth_code: &str) -> Result<Session, ProviderError> {
        self.enter("exchange_code_for_session").await?;

        let provider = self
            .pending_oauth
            .lock()
            .ok()
            .and_then(|mut p| p.take())
            .ok_or(ProviderError::NoPendingOAuth)?;
        let mut identity = self
            .oauth_identity
            .lock()
            .ok()
            .and_then(|i| i.clone())
            .ok_or_else(|| ProviderError::Api {
                status: 400,
                message: format!("Invalid auth code: {auth_code}"),
            })?;
        identity.app_metadata = serde_json::json!({ "provider": provider.as_str() });

        let session = issue_session(identity);
        self.session
            .publish(AuthEvent::SignedIn(session.clone()))
            .await;
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Session, ProviderError> {
        self.enter("refresh_session").await?;

        let current = self
            .session
            .current()
            .await
            .ok_or(ProviderError::NoSession)?;
        let session = issue_session(current.user);
        self.session
            .publish(AuthEvent::TokenRefreshed(session.clone()))
            .await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.enter("sign_out").await?;
        self.session.publish(AuthEvent::SignedOut).await;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProvider {
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), ProviderError> {
        self.enter("upsert_profile").await?;
        self.profiles
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::Role;

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let provider = InMemoryProvider::new();
        let credentials = Credentials::new("Asha@Example.com", "longpassword");

        provider.sign_up(&credentials, Some("Asha")).await.unwrap();
        assert!(provider.get_session().await.is_none());

        let session = provider.sign_in_with_password(&credentials).await.unwrap();
        assert_eq!(session.user.display_name(), "Asha");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let provider = InMemoryProvider::new();
        let credentials = Credentials::new("asha@example.com", "longpassword");
        provider.sign_up(&credentials, None).await.unwrap();

        let err = provider.sign_up(&credentials, None).await.unwrap_err();
        assert_eq!(err.user_message(), "User already registered");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let provider = InMemoryProvider::new();
        provider
            .register(Identity::new("u1", "asha@example.com"), "correct-horse")
            .await;

        let err = provider
            .sign_in_with_password(&Credentials::new("asha@example.com", "battery"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let provider = InMemoryProvider::new();
        let mut record = ProfileRecord {
            id: "u1".into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            role: Role::User,
            created_at: Utc::now(),
        };
        provider.upsert_profile(&record).await.unwrap();
        record.name = "Asha Rao".into();
        provider.upsert_profile(&record).await.unwrap();

        assert_eq!(provider.profile_count().await, 1);
        assert_eq!(provider.upsert_count(), 2);
        assert_eq!(provider.profile("u1").await.unwrap().name, "Asha Rao");
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_once() {
        let provider = InMemoryProvider::new();
        provider.fail_next(ProviderError::Api {
            status: 500,
            message: "boom".into(),
        });
        assert!(provider.sign_out().await.is_err());
        assert!(provider.sign_out().await.is_ok());
    }

    #[tokio::test]
    async fn oauth_round_trip_tags_provider() {
        let provider = InMemoryProvider::new()
            .with_oauth_identity(Identity::new("g1", "g@example.com").with_full_name("Gita"));

        let url = provider
            .sign_in_with_oauth(OAuthProvider::Google, "http://localhost:3000/boarding")
            .await
            .unwrap();
        assert!(url.as_str().contains("provider=google"));

        let session = provider.exchange_code_for_session("abc").await.unwrap();
        assert_eq!(session.user.auth_provider(), Some("google"));
        assert!(matches!(
            provider.exchange_code_for_session("abc").await,
            Err(ProviderError::NoPendingOAuth)
        ));
    }
}
