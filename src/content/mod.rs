pub mod copy;
pub mod generator;
pub mod loading;
pub mod session;
pub mod state;

pub use copy::{LoadingCopyProvider, StaticLoadingCopy};
pub use generator::ContentGenerator;
pub use loading::LoadingMessageCycle;
pub use session::ContentSession;
pub use state::{GenerationStatus, SessionState};
