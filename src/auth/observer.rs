use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::{
    models::Identity,
    subscription::{lock, Subscription},
};

use super::provider::{AuthEvent, IdentityProvider};

type IdentityCallback = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Tracks the identity-provider session and forwards it as
/// `Option<Identity>`.
///
/// At most one provider subscription is held; subscribing again replaces it.
/// Transport errors are delivered as `None`, never swallowed silently.
pub struct AuthObserver {
    provider: Arc<dyn IdentityProvider>,
    active: Arc<Mutex<Option<ActiveAuth>>>,
}

struct ActiveAuth {
    epoch: u64,
    // Held only for its release-on-drop.
    _subscription: Subscription,
}

impl AuthObserver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Register `on_change`. The returned handle releases the provider
    /// subscription; once it returns no further callbacks are made.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(Option<Identity>) + Send + Sync + 'static,
    {
        let on_change: IdentityCallback = Arc::new(on_change);
        let previous = lock(&self.active).take();
        drop(previous);

        let epoch = next_epoch();
        let callback = Box::new(move |event: AuthEvent| {
            let identity = match event {
                Ok(identity) => identity,
                Err(err) => {
                    warn!("Auth transport failed, treating session as signed out: {err}");
                    None
                }
            };
            on_change(identity);
        });

        let subscription = self.provider.observe(callback);
        *lock(&self.active) = Some(ActiveAuth {
            epoch,
            _subscription: subscription,
        });
        info!("Auth observer subscribed");

        let active = Arc::downgrade(&self.active);
        Subscription::new(move || {
            let Some(active) = active.upgrade() else {
                return;
            };
            let released = {
                let mut guard = lock(&active);
                match guard.as_ref() {
                    Some(current) if current.epoch == epoch => guard.take(),
                    _ => None,
                }
            };
            if released.is_some() {
                info!("Auth observer unsubscribed");
            }
            drop(released);
        })
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }
}

fn next_epoch() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static EPOCH: AtomicU64 = AtomicU64::new(1);
    EPOCH.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AuthCallback, LocalIdentityProvider},
        error::CoreError,
        subscription::ListenerSet,
    };
    use async_trait::async_trait;

    type Seen = Arc<Mutex<Vec<Option<String>>>>;

    fn recorder() -> (impl Fn(Option<Identity>) + Send + Sync + 'static, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |identity: Option<Identity>| {
            lock(&sink).push(identity.map(|i| i.id));
        };
        (callback, seen)
    }

    /// Provider whose transport fails after registration.
    struct FlakyProvider {
        listeners: ListenerSet<AuthEvent>,
    }

    #[async_trait]
    impl IdentityProvider for FlakyProvider {
        fn observe(&self, callback: AuthCallback) -> Subscription {
            let (key, sub) = self.listeners.add_keyed(callback);
            self.listeners
                .emit_to(key, Ok(Some(Identity::new("U1"))));
            sub
        }

        async fn sign_in(&self) -> Result<Identity, CoreError> {
            Err(CoreError::AuthTransport("offline".into()))
        }

        async fn sign_out(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn emits_immediately_and_on_transitions() {
        let provider = Arc::new(LocalIdentityProvider::new(Identity::new("U1")));
        let observer = AuthObserver::new(provider.clone());
        let (callback, seen) = recorder();

        let sub = observer.subscribe(callback);
        provider.sign_in().await.unwrap();
        provider.sign_out().await.unwrap();
        sub.unsubscribe();
        provider.sign_in().await.unwrap();

        assert_eq!(*lock(&seen), vec![None, Some("U1".into()), None]);
        assert!(!observer.is_subscribed());
    }

    #[tokio::test]
    async fn transport_error_surfaces_as_signed_out() {
        let provider = Arc::new(FlakyProvider {
            listeners: ListenerSet::new(),
        });
        let observer = AuthObserver::new(provider.clone());
        let (callback, seen) = recorder();
        let _sub = observer.subscribe(callback);

        provider
            .listeners
            .emit(Err(CoreError::AuthTransport("socket closed".into())));

        assert_eq!(*lock(&seen), vec![Some("U1".into()), None]);
    }

    #[tokio::test]
    async fn resubscribing_releases_the_previous_registration() {
        let provider = Arc::new(LocalIdentityProvider::new(Identity::new("U1")));
        let observer = AuthObserver::new(provider.clone());
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();

        let stale = observer.subscribe(first);
        let _current = observer.subscribe(second);
        provider.sign_in().await.unwrap();

        // Releasing the superseded handle must not tear down the live one.
        stale.unsubscribe();
        provider.sign_out().await.unwrap();

        assert_eq!(*lock(&first_seen), vec![None]);
        assert_eq!(*lock(&second_seen), vec![None, Some("U1".into()), None]);
    }
}
