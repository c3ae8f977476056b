pub mod local;
pub mod observer;
pub mod provider;

pub use local::LocalIdentityProvider;
pub use observer::AuthObserver;
pub use provider::{AuthCallback, AuthEvent, IdentityProvider};
