use async_trait::async_trait;

use crate::{error::CoreError, models::Profile, subscription::Subscription};

/// One delivery from a live profile subscription. `Ok(None)` means no record
/// exists for the watched id.
pub type ProfileSnapshot = Result<Option<Profile>, CoreError>;

pub type ProfileCallback = Box<dyn Fn(ProfileSnapshot) + Send>;

/// Remote per-user approval records.
///
/// `watch` must deliver the current record once after registration and again
/// after every change, and must not deliver anything once the returned
/// subscription has been released.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Profile>, CoreError>;

    /// Insert the record if none exists for `id`.
    async fn create(&self, id: &str, profile: &Profile) -> Result<(), CoreError>;

    fn watch(&self, id: &str, callback: ProfileCallback) -> Subscription;
}

#[cfg(test)]
pub(crate) mod failing {
    use super::*;
    use crate::models::{Identity, ProfileStatus};

    /// Which call breaks.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Failure {
        Get,
        Create,
        Watch,
    }

    /// Store whose backend breaks at one point of the bootstrap.
    pub(crate) struct FailingProfileStore(pub(crate) Failure);

    #[async_trait]
    impl ProfileStore for FailingProfileStore {
        async fn get(&self, id: &str) -> Result<Option<Profile>, CoreError> {
            match self.0 {
                Failure::Get => Err(CoreError::ProfileRead("backend unavailable".into())),
                Failure::Create => Ok(None),
                Failure::Watch => {
                    let mut profile = Profile::pending_for(&Identity::new(id), 0);
                    profile.status = ProfileStatus::Approved;
                    Ok(Some(profile))
                }
            }
        }

        async fn create(&self, _id: &str, _profile: &Profile) -> Result<(), CoreError> {
            Err(CoreError::ProfileWrite("permission denied".into()))
        }

        fn watch(&self, _id: &str, callback: ProfileCallback) -> Subscription {
            if let Failure::Watch = self.0 {
                callback(Err(CoreError::ProfileRead("listener closed".into())));
            }
            Subscription::new(|| {})
        }
    }
}
