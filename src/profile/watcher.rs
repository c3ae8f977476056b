use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    access::AccessStatus,
    error::CoreError,
    models::{Identity, Profile},
    subscription::{lock, Subscription},
};

use super::store::{ProfileCallback, ProfileSnapshot, ProfileStore};

/// Latest profile state for the current identity.
///
/// `epoch` increases on every identity change; snapshots carrying an older
/// epoch are never applied.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub epoch: u64,
    pub identity_id: Option<String>,
    pub profile: Option<Profile>,
    pub status: AccessStatus,
    pub initial_load_complete: bool,
}

impl ProfileView {
    fn initial() -> Self {
        Self {
            epoch: 0,
            identity_id: None,
            profile: None,
            status: AccessStatus::Unknown,
            initial_load_complete: false,
        }
    }

    fn signed_out(epoch: u64) -> Self {
        Self {
            epoch,
            identity_id: None,
            profile: None,
            status: AccessStatus::Unknown,
            initial_load_complete: true,
        }
    }

    fn loading(epoch: u64, identity_id: &str) -> Self {
        Self {
            epoch,
            identity_id: Some(identity_id.to_string()),
            profile: None,
            status: AccessStatus::Unknown,
            initial_load_complete: false,
        }
    }

    fn apply(&mut self, snapshot: ProfileSnapshot) {
        match snapshot {
            Ok(Some(profile)) => {
                self.status = profile.status.into();
                self.profile = Some(profile);
            }
            Ok(None) => {
                warn!(
                    "Profile for {:?} is missing; holding access as unknown",
                    self.identity_id
                );
                self.status = AccessStatus::Unknown;
                self.profile = None;
            }
            Err(err) => self.fail(&err),
        }
        self.initial_load_complete = true;
    }

    fn fail(&mut self, err: &CoreError) {
        warn!("Profile unavailable for {:?}: {err}", self.identity_id);
        self.status = AccessStatus::Unknown;
        self.profile = None;
        self.initial_load_complete = true;
    }
}

struct WatcherInner {
    epoch: u64,
    identity_id: Option<String>,
    subscription: Option<Subscription>,
    bootstrap: Option<JoinHandle<()>>,
}

/// Keeps at most one live profile subscription, for the current identity.
pub struct ProfileWatcher {
    store: Arc<dyn ProfileStore>,
    inner: Arc<Mutex<WatcherInner>>,
    tx: Arc<watch::Sender<ProfileView>>,
}

impl ProfileWatcher {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        let (tx, _rx) = watch::channel(ProfileView::initial());
        Self {
            store,
            inner: Arc::new(Mutex::new(WatcherInner {
                epoch: 0,
                identity_id: None,
                subscription: None,
                bootstrap: None,
            })),
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileView> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ProfileView {
        self.tx.borrow().clone()
    }

    pub fn has_live_subscription(&self) -> bool {
        lock(&self.inner).subscription.is_some()
    }

    /// Point the watcher at `identity`. The previous subscription is released
    /// before a new one is opened, and from this call on no snapshot for the
    /// previous identity is published. Must be called inside a Tokio runtime.
    pub fn set_identity(&self, identity: Option<Identity>) {
        let new_id = identity.as_ref().map(|i| i.id.clone());

        let (stale_subscription, stale_bootstrap, epoch) = {
            let mut inner = lock(&self.inner);
            if inner.epoch > 0 && inner.identity_id == new_id {
                return;
            }
            inner.epoch += 1;
            let epoch = inner.epoch;
            inner.identity_id = new_id.clone();

            // Publishing the new epoch first makes late deliveries from the
            // old subscription fail their epoch check.
            self.tx.send_replace(match &new_id {
                Some(id) => ProfileView::loading(epoch, id),
                None => ProfileView::signed_out(epoch),
            });

            (inner.subscription.take(), inner.bootstrap.take(), epoch)
        };

        if let Some(task) = stale_bootstrap {
            task.abort();
        }
        if let Some(subscription) = stale_subscription {
            subscription.unsubscribe();
            info!("Released profile subscription (epoch {})", epoch - 1);
        }

        let Some(identity) = identity else {
            return;
        };

        let handle = tokio::spawn(bootstrap(
            Arc::clone(&self.store),
            Arc::downgrade(&self.inner),
            Arc::clone(&self.tx),
            identity,
            epoch,
        ));

        let mut inner = lock(&self.inner);
        if inner.epoch == epoch {
            inner.bootstrap = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Release everything; equivalent to the identity becoming null.
    pub fn clear(&self) {
        self.set_identity(None);
    }
}

impl Drop for ProfileWatcher {
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        if let Some(task) = inner.bootstrap.take() {
            task.abort();
        }
        drop(inner.subscription.take());
    }
}

/// Make sure a record exists for `identity`, writing a pending one if not.
pub async fn ensure_profile(
    store: &dyn ProfileStore,
    identity: &Identity,
) -> Result<Profile, CoreError> {
    if let Some(existing) = store.get(&identity.id).await? {
        return Ok(existing);
    }

    let profile = Profile::pending_for(identity, Utc::now().timestamp_millis());
    store.create(&identity.id, &profile).await?;
    info!("Created pending profile for {}", identity.id);

    // Another writer may have won the insert; report what is stored.
    Ok(store.get(&identity.id).await?.unwrap_or(profile))
}

async fn bootstrap(
    store: Arc<dyn ProfileStore>,
    inner: Weak<Mutex<WatcherInner>>,
    tx: Arc<watch::Sender<ProfileView>>,
    identity: Identity,
    epoch: u64,
) {
    if let Err(err) = ensure_profile(store.as_ref(), &identity).await {
        tx.send_if_modified(|view| {
            if view.epoch != epoch {
                return false;
            }
            view.fail(&err);
            true
        });
        return;
    }

    if !is_current(&inner, epoch) {
        return;
    }

    let subscription = store.watch(&identity.id, snapshot_listener(Arc::clone(&tx), epoch));

    let stale = match inner.upgrade() {
        Some(inner) => {
            let mut guard = lock(&inner);
            if guard.epoch == epoch {
                guard.subscription = Some(subscription);
                None
            } else {
                Some(subscription)
            }
        }
        None => Some(subscription),
    };
    drop(stale);
}

fn is_current(inner: &Weak<Mutex<WatcherInner>>, epoch: u64) -> bool {
    match inner.upgrade() {
        Some(inner) => {
            let current = lock(&inner).epoch;
            current == epoch
        }
        None => false,
    }
}

fn snapshot_listener(tx: Arc<watch::Sender<ProfileView>>, epoch: u64) -> ProfileCallback {
    Box::new(move |snapshot| {
        tx.send_if_modified(|view| {
            if view.epoch != epoch {
                return false;
            }
            view.apply(snapshot);
            true
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::Database,
        db::SqliteProfileStore,
        models::ProfileStatus,
        profile::store::failing::{Failure, FailingProfileStore},
    };

    fn open() -> (tempfile::TempDir, SqliteProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("watcher.sqlite3")).unwrap();
        (dir, SqliteProfileStore::new(db))
    }

    async fn loaded_for(rx: &mut watch::Receiver<ProfileView>, id: &str) -> ProfileView {
        rx.wait_for(|view| {
            view.identity_id.as_deref() == Some(id) && view.initial_load_complete
        })
        .await
        .unwrap()
        .clone()
    }

    #[tokio::test]
    async fn creates_pending_profile_for_new_identity() {
        let (_dir, store) = open();
        let watcher = ProfileWatcher::new(Arc::new(store.clone()));
        let mut rx = watcher.subscribe();

        watcher.set_identity(Some(Identity::new("U1").with_display_name("Fatimah")));
        let view = loaded_for(&mut rx, "U1").await;

        assert_eq!(view.status, AccessStatus::Pending);
        let stored = store.get("U1").await.unwrap().unwrap();
        assert_eq!(stored.status, ProfileStatus::Pending);
        assert_eq!(stored.display_name, "Fatimah");
        assert!(watcher.has_live_subscription());
    }

    #[tokio::test]
    async fn live_approval_updates_status() {
        let (_dir, store) = open();
        let watcher = ProfileWatcher::new(Arc::new(store.clone()));
        let mut rx = watcher.subscribe();

        watcher.set_identity(Some(Identity::new("U1")));
        loaded_for(&mut rx, "U1").await;
        while !watcher.has_live_subscription() {
            tokio::task::yield_now().await;
        }

        store.set_status("U1", ProfileStatus::Approved).await.unwrap();
        let view = rx
            .wait_for(|view| view.status == AccessStatus::Approved)
            .await
            .unwrap()
            .clone();
        assert_eq!(view.identity_id.as_deref(), Some("U1"));
    }

    #[tokio::test]
    async fn switching_identity_ignores_old_snapshots() {
        let (_dir, store) = open();
        let watcher = ProfileWatcher::new(Arc::new(store.clone()));
        let mut rx = watcher.subscribe();

        watcher.set_identity(Some(Identity::new("U1")));
        loaded_for(&mut rx, "U1").await;
        while !watcher.has_live_subscription() {
            tokio::task::yield_now().await;
        }

        watcher.set_identity(Some(Identity::new("U2")));
        store.set_status("U1", ProfileStatus::Approved).await.unwrap();

        let view = loaded_for(&mut rx, "U2").await;
        assert_eq!(view.status, AccessStatus::Pending);

        store.set_status("U1", ProfileStatus::Blocked).await.unwrap();
        let current = watcher.current();
        assert_eq!(current.identity_id.as_deref(), Some("U2"));
        assert_eq!(current.status, AccessStatus::Pending);
        assert_eq!(current.profile.map(|p| p.id).as_deref(), Some("U2"));
    }

    #[tokio::test]
    async fn signing_out_releases_subscription() {
        let (_dir, store) = open();
        let watcher = ProfileWatcher::new(Arc::new(store.clone()));
        let mut rx = watcher.subscribe();

        watcher.set_identity(Some(Identity::new("U1")));
        loaded_for(&mut rx, "U1").await;
        while !watcher.has_live_subscription() {
            tokio::task::yield_now().await;
        }

        watcher.clear();
        assert!(!watcher.has_live_subscription());

        store.set_status("U1", ProfileStatus::Approved).await.unwrap();
        let view = watcher.current();
        assert_eq!(view.identity_id, None);
        assert!(view.initial_load_complete);
        assert_eq!(view.status, AccessStatus::Unknown);
    }

    #[tokio::test]
    async fn repeated_identity_keeps_subscription() {
        let (_dir, store) = open();
        let watcher = ProfileWatcher::new(Arc::new(store.clone()));
        let mut rx = watcher.subscribe();

        watcher.set_identity(Some(Identity::new("U1")));
        let first = loaded_for(&mut rx, "U1").await;
        watcher.set_identity(Some(Identity::new("U1")));

        assert_eq!(watcher.current().epoch, first.epoch);
    }

    #[tokio::test]
    async fn store_failures_hold_access_as_unknown() {
        for failure in [Failure::Get, Failure::Create, Failure::Watch] {
            let watcher = ProfileWatcher::new(Arc::new(FailingProfileStore(failure)));
            let mut rx = watcher.subscribe();

            watcher.set_identity(Some(Identity::new("U1")));
            let view = loaded_for(&mut rx, "U1").await;

            assert_eq!(view.status, AccessStatus::Unknown, "{failure:?}");
            assert!(view.initial_load_complete, "{failure:?}");
            assert_eq!(view.profile, None, "{failure:?}");
        }
    }
}
