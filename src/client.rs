//! Session and store wired to one gateway.
//!
//! The store never outlives the session it was filled under: logging out,
//! and any login attempt, start it over from empty.

use std::sync::Arc;

use crate::gateway::{Gateway, GatewayError};
use crate::model::{Credentials, Registration, User};
use crate::session::storage::KeyValueStore;
use crate::session::{SessionInfo, SessionManager};
use crate::store::EntityStore;

pub struct Client<G, S> {
    gateway: Arc<G>,
    session: SessionManager<S>,
    store: EntityStore<G>,
}

impl<G: Gateway, S: KeyValueStore> Client<G, S> {
    /// Restore the stored session onto `gateway` and start with an empty store
    pub fn new(gateway: Arc<G>, storage: S) -> Self {
        let session = SessionManager::restore(storage, gateway.as_ref());
        let store = EntityStore::new(Arc::clone(&gateway));
        Client {
            gateway,
            session,
            store,
        }
    }

    pub fn login(&mut self, credentials: &Credentials) -> Option<SessionInfo> {
        self.store.reset();
        self.session.login(self.gateway.as_ref(), credentials)
    }

    /// Local logout. Returns whether a session was active.
    pub fn logout(&mut self) -> bool {
        let was_logged_in = self.session.logout(self.gateway.as_ref());
        self.store.reset();
        was_logged_in
    }

    pub fn register(&self, data: &Registration) -> Result<User, GatewayError> {
        self.session.register(self.gateway.as_ref(), data)
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub fn session(&self) -> &SessionManager<S> {
        &self.session
    }

    pub fn store(&self) -> &EntityStore<G> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore<G> {
        &mut self.store
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }
}
