//! Session and access lifecycle for the Qalbu mood journal.
//!
//! [`AppController`] reconciles the identity-provider session, the live
//! approval record of the signed-in user and the mood/content cycle into a
//! single [`AppView`].

mod utils;

pub mod access;
pub mod auth;
pub mod content;
pub mod db;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod models;
pub mod profile;
pub mod settings;
pub mod subscription;

pub use access::{AccessStatus, AccessView};
pub use auth::{AuthObserver, IdentityProvider, LocalIdentityProvider};
pub use content::{
    ContentGenerator, ContentSession, GenerationStatus, LoadingCopyProvider, SessionState,
    StaticLoadingCopy,
};
pub use db::{Database, SqliteProfileStore};
pub use error::CoreError;
pub use history::HistoryStore;
pub use lifecycle::{AppController, AppView, Collaborators};
pub use models::{HealingContent, HistoryLogEntry, Identity, Mood, Profile, ProfileStatus};
pub use profile::{ProfileStore, ProfileView, ProfileWatcher};
pub use settings::{Settings, SettingsStore};
pub use subscription::Subscription;

/// Install the `env_logger` backend. Reads `RUST_LOG`, defaulting to Info.
/// Later calls are ignored.
pub fn init_logging() {
    let result = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();

    if result.is_ok() {
        log::info!("Qalbu logging initialised");
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_logging_twice_is_harmless() {
        super::init_logging();
        super::init_logging();
    }
}
