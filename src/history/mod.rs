//! Mood-selection journal.
//!
//! Writing an entry never waits on storage: the entry is built in memory and
//! persisted in the background, so selecting a mood can log synchronously
//! before any generation work starts.

use async_trait::async_trait;

use crate::{
    error::CoreError,
    models::{HistoryLogEntry, Mood},
};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    fn log_selection(&self, mood: Mood) -> HistoryLogEntry;

    /// Logged selections, newest first.
    async fn recent(&self, limit: usize, offset: usize) -> Result<Vec<HistoryLogEntry>, CoreError>;
}
