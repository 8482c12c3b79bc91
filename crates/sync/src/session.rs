//! The signed-in session.

use std::sync::Arc;

use pantry_core::{Phone, Role};
use tokio::sync::watch;

use crate::api::{AuthSession, RefreshResponse};
use crate::error::SyncError;
use crate::persist::Storage;
use crate::store::LocalStore;

/// Storage key for the persisted session.
pub const SESSION_KEY: &str = "auth-session";

/// Persisted, observable session shared by the HTTP backend (tokens) and the
/// collection services (phone number used in request paths).
#[derive(Clone)]
pub struct SessionStore {
    store: LocalStore<Option<AuthSession>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            store: LocalStore::new(SESSION_KEY, storage),
        }
    }

    /// Load the persisted session, if any.
    pub fn init(&self) {
        self.store.init();
    }

    #[must_use]
    pub fn get(&self) -> Option<AuthSession> {
        self.store.get()
    }

    pub fn set(&self, session: AuthSession) {
        self.store.replace(Some(session));
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.store.with(Option::is_some)
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.store.with(|s| s.as_ref().map(|s| s.role))
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.store.with(|s| s.as_ref().map(|s| s.token.clone()))
    }

    /// Phone number of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session.
    pub fn phone(&self) -> Result<Phone, SyncError> {
        self.store
            .with(|s| s.as_ref().map(|s| s.phone.clone()))
            .ok_or(SyncError::NotSignedIn)
    }

    /// Store a refreshed token pair. Ignored if the session was cleared
    /// while the refresh was in flight.
    pub fn apply_refresh(&self, refreshed: RefreshResponse) {
        self.store.reconcile(|current| {
            current.as_ref().map(|session| {
                let mut session = session.clone();
                session.refresh(refreshed);
                Some(session)
            })
        });
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.store.subscribe()
    }
}
