use std::sync::Mutex;

use async_trait::async_trait;
use log::info;

use crate::{
    error::CoreError,
    models::Identity,
    subscription::{lock, ListenerSet, Subscription},
};

use super::provider::{AuthCallback, AuthEvent, IdentityProvider};

struct LocalState {
    account: Identity,
    signed_in: Option<Identity>,
}

/// Device-local provider with a single configured account. Useful offline and
/// wherever no hosted identity service is wired in.
pub struct LocalIdentityProvider {
    state: Mutex<LocalState>,
    listeners: ListenerSet<AuthEvent>,
}

impl LocalIdentityProvider {
    pub fn new(account: Identity) -> Self {
        Self {
            state: Mutex::new(LocalState {
                account,
                signed_in: None,
            }),
            listeners: ListenerSet::new(),
        }
    }

    pub fn current(&self) -> Option<Identity> {
        lock(&self.state).signed_in.clone()
    }

    /// Replace the configured account. A signed-in session switches to it
    /// immediately.
    pub fn switch_account(&self, account: Identity) {
        let mut state = lock(&self.state);
        state.account = account.clone();
        if state.signed_in.is_some() {
            info!("Local identity switched to {}", account.id);
            state.signed_in = Some(account.clone());
            self.listeners.emit(Ok(Some(account)));
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn observe(&self, callback: AuthCallback) -> Subscription {
        // Emission happens under the state lock so the initial delivery can
        // never overtake a concurrent transition.
        let state = lock(&self.state);
        let (key, subscription) = self.listeners.add_keyed(callback);
        self.listeners.emit_to(key, Ok(state.signed_in.clone()));
        subscription
    }

    async fn sign_in(&self) -> Result<Identity, CoreError> {
        let mut state = lock(&self.state);
        let identity = state.account.clone();
        state.signed_in = Some(identity.clone());
        info!("Local identity {} signed in", identity.id);
        self.listeners.emit(Ok(Some(identity.clone())));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), CoreError> {
        let mut state = lock(&self.state);
        if state.signed_in.take().is_some() {
            info!("Local identity signed out");
            self.listeners.emit(Ok(None));
        }
        Ok(())
    }
}
