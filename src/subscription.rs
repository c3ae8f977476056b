//! Disposer handles for live external subscriptions.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::log_warn;

const ENABLE_LOGS: bool = true;

/// Owned registration with an external source. Releasing it (explicitly or by
/// drop) runs the disposer exactly once.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

type Callback<T> = Box<dyn Fn(T) + Send>;

struct Registry<T> {
    next_id: u64,
    callbacks: HashMap<u64, Callback<T>>,
}

/// Fan-out set of callbacks. Delivery happens under the set's lock, so once
/// the returned [`Subscription`] is released no callback for it can start and
/// none is still running. Callbacks must not add to or release from the set
/// they are being called from.
pub struct ListenerSet<T> {
    inner: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                callbacks: HashMap::new(),
            })),
        }
    }
}

impl<T: Clone + Send + 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + 'static,
    {
        self.add_keyed(callback).1
    }

    /// Like [`ListenerSet::add`], also returning the key for [`ListenerSet::emit_to`].
    pub fn add_keyed<F>(&self, callback: F) -> (u64, Subscription)
    where
        F: Fn(T) + Send + 'static,
    {
        let id = {
            let mut guard = lock(&self.inner);
            let id = guard.next_id;
            guard.next_id += 1;
            guard.callbacks.insert(id, Box::new(callback));
            id
        };

        let inner = Arc::downgrade(&self.inner);
        let subscription = Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                lock(&inner).callbacks.remove(&id);
            }
        });
        (id, subscription)
    }

    /// Deliver to a single listener, e.g. an initial snapshot.
    pub fn emit_to(&self, id: u64, value: T) -> bool {
        let guard = lock(&self.inner);
        match guard.callbacks.get(&id) {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    pub fn emit(&self, value: T) {
        let guard = lock(&self.inner);
        for callback in guard.callbacks.values() {
            callback(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log_warn!("Recovering poisoned lock");
            poisoned.into_inner()
        }
    }
}
