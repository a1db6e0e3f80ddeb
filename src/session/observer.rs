//! Session observer: keeps a view's idea of "who is signed in" current.
//!
//! `SessionObserver::start` reads the session once, then follows the
//! provider's session-change events. Each event replaces the held identity.
//! The returned [`SessionSubscription`] owns the listener task: dropping it
//! stops the listener and releases the broadcast receiver.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::model::{AuthenticatedIdentity, Identity};
use super::provider::SessionProvider;

/// Shared, read-mostly view of the current identity.
#[derive(Clone, Default)]
pub struct SessionContext {
    identity: Arc<RwLock<Option<Identity>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    /// The current identity as an onboarding precondition, if signed in.
    pub async fn authenticated(&self) -> Option<AuthenticatedIdentity> {
        self.current()
            .await
            .map(AuthenticatedIdentity::from_identity)
    }

    async fn replace(&self, identity: Option<Identity>) {
        *self.identity.write().await = identity;
    }
}

/// Handle for the session-change listener. Dropping it unsubscribes.
pub struct SessionSubscription {
    handle: JoinHandle<()>,
}

impl SessionSubscription {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop listening now.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct SessionObserver;

impl SessionObserver {
    /// Fetch the current session and start following changes.
    pub async fn start(
        provider: Arc<dyn SessionProvider>,
    ) -> (SessionContext, SessionSubscription) {
        let context = SessionContext::new();

        // Subscribe before the initial read so nothing emitted in between is missed
        let mut rx = provider.subscribe();
        let initial = provider.get_session().await.map(|s| s.user);
        debug!(signed_in = initial.is_some(), "Initial session loaded");
        context.replace(initial).await;

        let listener = context.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let identity = event.session().map(|s| s.user.clone());
                        debug!(
                            event = event.kind(),
                            user_id = identity.as_ref().map(|i| i.id.as_str()).unwrap_or("-"),
                            "Session change observed"
                        );
                        listener.replace(identity).await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Session observer lagged, re-reading session");
                        let identity = provider.get_session().await.map(|s| s.user);
                        listener.replace(identity).await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Session event stream closed");
                        break;
                    }
                }
            }
        });

        (context, SessionSubscription { handle })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::memory::InMemoryProvider;
    use crate::session::model::{AuthEvent, Identity, Session};

    /// Poll until the context satisfies `check` or a second has gone by.
    async fn wait_for(context: &SessionContext, check: impl Fn(Option<Identity>) -> bool) {
        for _ in 0..100 {
            if check(context.current().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session context did not reach expected state");
    }

    #[tokio::test]
    async fn starts_with_existing_session() {
        let provider = Arc::new(InMemoryProvider::new());
        provider
            .start_session(Identity::new("u1", "a@example.com"))
            .await;

        let (context, _sub) = SessionObserver::start(provider.clone()).await;
        assert_eq!(context.current().await.unwrap().id, "u1");
        assert_eq!(context.authenticated().await.unwrap().id(), "u1");
    }

    #[tokio::test]
    async fn each_event_replaces_identity() {
        let provider = Arc::new(InMemoryProvider::new());
        let (context, _sub) = SessionObserver::start(provider.clone()).await;
        assert!(context.current().await.is_none());

        provider
            .start_session(Identity::new("u1", "a@example.com"))
            .await;
        wait_for(&context, |i| i.is_some_and(|i| i.id == "u1")).await;

        let next = Session::new("at", "rt", None, Identity::new("u2", "b@example.com"));
        provider.emit(AuthEvent::TokenRefreshed(next)).await;
        wait_for(&context, |i| i.is_some_and(|i| i.id == "u2")).await;

        provider.emit(AuthEvent::SignedOut).await;
        wait_for(&context, |i| i.is_none()).await;
    }

    #[tokio::test]
    async fn dropping_subscription_stops_updates() {
        let provider = Arc::new(InMemoryProvider::new());
        let (context, sub) = SessionObserver::start(provider.clone()).await;
        assert!(sub.is_active());

        sub.unsubscribe();
        // Let the abort land
        tokio::time::sleep(Duration::from_millis(20)).await;

        provider
            .start_session(Identity::new("u1", "a@example.com"))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(context.current().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_releases_the_event_receiver() {
        let provider = Arc::new(InMemoryProvider::new());
        let (_context, sub) = SessionObserver::start(provider.clone()).await;
        assert_eq!(provider.listener_count(), 1);

        sub.unsubscribe();
        for _ in 0..100 {
            if provider.listener_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("listener task still holds its receiver");
    }
}
