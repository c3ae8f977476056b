use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{connection::Database, helpers::parse_status},
    error::CoreError,
    models::{Profile, ProfileStatus},
    profile::{ProfileCallback, ProfileSnapshot, ProfileStore},
    subscription::{lock, ListenerSet, Subscription},
};

fn row_to_profile(row: &Row) -> Result<Profile> {
    let status: String = row.get("status")?;

    Ok(Profile {
        id: row.get("id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        avatar_url: row.get("avatar_url")?,
        status: parse_status(&status)?,
        requested_at: row.get("requested_at")?,
    })
}

fn read_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, display_name, avatar_url, status, requested_at
         FROM profiles
         WHERE id = ?1",
    )?;
    let profile = stmt
        .query_row(params![id], |row| Ok(row_to_profile(row)))
        .optional()?
        .transpose()?;
    Ok(profile)
}

type Watchers = Arc<Mutex<HashMap<String, ListenerSet<ProfileSnapshot>>>>;

/// Profile records kept in the local database, with live watchers.
///
/// Snapshots are produced on the database thread in command order, so a
/// watcher never sees an older record after a newer one.
#[derive(Clone)]
pub struct SqliteProfileStore {
    db: Database,
    watchers: Watchers,
}

impl SqliteProfileStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Approval decision made by the administrator. Returns `false` when no
    /// record exists for `id`.
    pub async fn set_status(&self, id: &str, status: ProfileStatus) -> Result<bool> {
        let id = id.to_string();
        let watchers = Arc::clone(&self.watchers);
        self.db
            .execute(move |conn| {
                let rows_affected = conn.execute(
                    "UPDATE profiles SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )?;
                if rows_affected == 0 {
                    return Ok(false);
                }
                let snapshot = read_profile(conn, &id)?;
                notify(&watchers, &id, Ok(snapshot));
                Ok(true)
            })
            .await
    }

    pub async fn list_by_status(&self, status: ProfileStatus) -> Result<Vec<Profile>> {
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, display_name, avatar_url, status, requested_at
                     FROM profiles
                     WHERE status = ?1
                     ORDER BY requested_at ASC",
                )?;
                let mut rows = stmt.query(params![status.as_str()])?;
                let mut profiles = Vec::new();
                while let Some(row) = rows.next()? {
                    profiles.push(row_to_profile(row)?);
                }
                Ok(profiles)
            })
            .await
    }

    /// Register `callback` for `id`. The entry for `id` is dropped once its
    /// last listener is released.
    fn register(
        &self,
        id: &str,
        callback: ProfileCallback,
    ) -> (ListenerSet<ProfileSnapshot>, u64, Subscription) {
        let (listeners, key, inner) = {
            let mut watchers = lock(&self.watchers);
            let listeners = watchers.entry(id.to_string()).or_default().clone();
            let (key, inner) = listeners.add_keyed(callback);
            (listeners, key, inner)
        };

        let watchers = Arc::downgrade(&self.watchers);
        let profile_id = id.to_string();
        let subscription = Subscription::new(move || {
            inner.unsubscribe();
            let Some(watchers) = watchers.upgrade() else {
                return;
            };
            let mut watchers = lock(&watchers);
            if watchers.get(&profile_id).is_some_and(ListenerSet::is_empty) {
                watchers.remove(&profile_id);
            }
        });
        (listeners, key, subscription)
    }
}

fn notify(watchers: &Watchers, id: &str, snapshot: ProfileSnapshot) {
    let listeners = lock(watchers).get(id).cloned();
    if let Some(listeners) = listeners {
        listeners.emit(snapshot);
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn get(&self, id: &str) -> Result<Option<Profile>, CoreError> {
        let id = id.to_string();
        self.db
            .execute(move |conn| read_profile(conn, &id))
            .await
            .map_err(|err| CoreError::ProfileRead(format!("{err:#}")))
    }

    async fn create(&self, id: &str, profile: &Profile) -> Result<(), CoreError> {
        if profile.id != id {
            return Err(CoreError::ProfileWrite(format!(
                "profile id {} does not match {id}",
                profile.id
            )));
        }

        let record = profile.clone();
        let watchers = Arc::clone(&self.watchers);
        self.db
            .execute(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO profiles (id, email, display_name, avatar_url, status, requested_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.id,
                        record.email,
                        record.display_name,
                        record.avatar_url,
                        record.status.as_str(),
                        record.requested_at,
                    ],
                )?;
                if inserted > 0 {
                    notify(&watchers, &record.id, Ok(Some(record.clone())));
                }
                Ok(())
            })
            .await
            .map_err(|err| CoreError::ProfileWrite(format!("{err:#}")))
    }

    fn watch(&self, id: &str, callback: ProfileCallback) -> Subscription {
        let (listeners, key, subscription) = self.register(id, callback);

        let profile_id = id.to_string();
        let initial = listeners.clone();
        let queued = self.db.submit("initial profile snapshot", move |conn| {
            let snapshot = read_profile(conn, &profile_id)
                .map_err(|err| CoreError::ProfileRead(format!("{err:#}")));
            initial.emit_to(key, snapshot);
            Ok(())
        });

        if let Err(err) = queued {
            listeners.emit_to(key, Err(CoreError::from(err)));
        }

        subscription
    }
}

impl std::fmt::Debug for SqliteProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProfileStore")
            .field("path", &self.db.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;
    use tokio::sync::mpsc;

    fn open() -> (tempfile::TempDir, SqliteProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("profiles.sqlite3")).unwrap();
        (dir, SqliteProfileStore::new(db))
    }

    fn channel_callback() -> (ProfileCallback, mpsc::UnboundedReceiver<ProfileSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: ProfileCallback = Box::new(move |snapshot| {
            let _ = tx.send(snapshot);
        });
        (callback, rx)
    }

    #[tokio::test]
    async fn create_is_insert_if_absent() {
        let (_dir, store) = open();
        let pending = Profile::pending_for(&Identity::new("U1"), 10);
        store.create("U1", &pending).await.unwrap();

        let mut second = pending.clone();
        second.status = ProfileStatus::Approved;
        store.create("U1", &second).await.unwrap();

        let stored = store.get("U1").await.unwrap().unwrap();
        assert_eq!(stored.status, ProfileStatus::Pending);
    }

    #[tokio::test]
    async fn create_rejects_mismatched_id() {
        let (_dir, store) = open();
        let profile = Profile::pending_for(&Identity::new("U1"), 10);
        assert!(matches!(
            store.create("U2", &profile).await,
            Err(CoreError::ProfileWrite(_))
        ));
    }

    #[tokio::test]
    async fn watch_delivers_initial_snapshot_then_changes() {
        let (_dir, store) = open();
        let (callback, mut rx) = channel_callback();
        let _sub = store.watch("U1", callback);

        assert_eq!(rx.recv().await.unwrap(), Ok(None));

        let pending = Profile::pending_for(&Identity::new("U1"), 10);
        store.create("U1", &pending).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Ok(Some(pending.clone())));

        assert!(store.set_status("U1", ProfileStatus::Approved).await.unwrap());
        let approved = rx.recv().await.unwrap().unwrap().unwrap();
        assert_eq!(approved.status, ProfileStatus::Approved);

        let listed = store.list_by_status(ProfileStatus::Approved).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn released_watch_stops_delivery() {
        let (_dir, store) = open();
        store
            .create("U1", &Profile::pending_for(&Identity::new("U1"), 10))
            .await
            .unwrap();

        let (callback, mut rx) = channel_callback();
        let sub = store.watch("U1", callback);
        assert!(rx.recv().await.unwrap().unwrap().is_some());

        sub.unsubscribe();
        store.set_status("U1", ProfileStatus::Blocked).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn last_release_forgets_the_watched_id() {
        let (_dir, store) = open();
        let (first_cb, mut first_rx) = channel_callback();
        let (second_cb, mut second_rx) = channel_callback();

        let first = store.watch("U1", first_cb);
        let second = store.watch("U1", second_cb);
        first_rx.recv().await.unwrap().unwrap();
        second_rx.recv().await.unwrap().unwrap();

        first.unsubscribe();
        assert!(lock(&store.watchers).contains_key("U1"));

        second.unsubscribe();
        assert!(lock(&store.watchers).is_empty());

        let (third_cb, mut third_rx) = channel_callback();
        let _third = store.watch("U1", third_cb);
        assert_eq!(third_rx.recv().await.unwrap(), Ok(None));
        assert_eq!(lock(&store.watchers).len(), 1);
    }

    #[tokio::test]
    async fn set_status_on_unknown_id_reports_missing() {
        let (_dir, store) = open();
        assert!(!store.set_status("ghost", ProfileStatus::Approved).await.unwrap());
    }
}
