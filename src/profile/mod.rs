pub mod store;
pub mod watcher;

pub use store::{ProfileCallback, ProfileSnapshot, ProfileStore};
pub use watcher::{ensure_profile, ProfileView, ProfileWatcher};
