use async_trait::async_trait;

use crate::{error::CoreError, models::Identity, subscription::Subscription};

/// One auth-state delivery. `Ok(None)` is a signed-out session.
pub type AuthEvent = Result<Option<Identity>, CoreError>;

pub type AuthCallback = Box<dyn Fn(AuthEvent) + Send>;

/// External identity provider.
///
/// `observe` delivers the current auth state once on registration and again on
/// every sign-in/sign-out transition.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn observe(&self, callback: AuthCallback) -> Subscription;

    async fn sign_in(&self) -> Result<Identity, CoreError>;

    async fn sign_out(&self) -> Result<(), CoreError>;
}
