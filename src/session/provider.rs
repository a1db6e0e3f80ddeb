//! Session provider traits and the shared session cell.

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::model::{AuthEvent, Credentials, OAuthProvider, Session};
use crate::error::ProviderError;
use crate::onboarding::ProfileRecord;

/// Broadcast capacity for session-change events.
const AUTH_EVENT_CAPACITY: usize = 64;

/// Hosted identity service: sign-up, sign-in, federated sign-in and session
/// lifecycle.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current session, if any.
    async fn get_session(&self) -> Option<Session>;

    /// Subscribe to session-change events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Register a new account. `full_name` is stored as user metadata.
    async fn sign_up(
        &self,
        credentials: &Credentials,
        full_name: Option<&str>,
    ) -> Result<(), ProviderError>;

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, ProviderError>;

    /// Start a federated sign-in. Returns the URL the browser must visit;
    /// the provider sends the user back to `redirect_to` with an auth code.
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<Url, ProviderError>;

    /// Finish a federated sign-in with the code from the redirect.
    async fn exchange_code_for_session(&self, auth_code: &str) -> Result<Session, ProviderError>;

    async fn refresh_session(&self) -> Result<Session, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Row store holding profile records (table `users`).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert or fully replace the record keyed by `record.id`.
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), ProviderError>;
}

/// Current session plus the broadcast channel announcing changes to it.
///
/// Updates and broadcasts happen under the same write lock, so subscribers
/// see events in the order the session changed.
pub struct SessionCell {
    current: RwLock<Option<Session>>,
    tx: broadcast::Sender<AuthEvent>,
}

impl SessionCell {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            current: RwLock::new(None),
            tx,
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Replace the current session and announce the change.
    pub async fn publish(&self, event: AuthEvent) {
        let mut current = self.current.write().await;
        *current = event.session().cloned();
        debug!(event = event.kind(), "Session changed");
        // Ok if nobody is listening
        let _ = self.tx.send(event);
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}
