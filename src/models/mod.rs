pub mod content;
pub mod history;
pub mod identity;
pub mod mood;
pub mod profile;

pub use content::HealingContent;
pub use history::HistoryLogEntry;
pub use identity::Identity;
pub use mood::Mood;
pub use profile::{Profile, ProfileStatus};
