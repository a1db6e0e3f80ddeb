//! Session layer: identity types, the provider seam, and the observer that
//! keeps views in sync with the provider's session.

pub mod memory;
pub mod model;
pub mod observer;
pub mod provider;
pub mod routes;
pub mod supabase;

pub use memory::InMemoryProvider;
pub use model::{
    AuthEvent, AuthenticatedIdentity, Credentials, Identity, IdentitySummary, OAuthProvider,
    Session,
};
pub use observer::{SessionContext, SessionObserver, SessionSubscription};
pub use provider::{ProfileStore, SessionCell, SessionProvider};
pub use routes::{SessionRouteState, session_routes};
pub use supabase::SupabaseClient;
