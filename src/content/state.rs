use serde::{Deserialize, Serialize};

use crate::models::{HealingContent, Mood};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failed,
}

/// Renderable state of the mood/content cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub mood: Option<Mood>,
    pub status: GenerationStatus,
    pub content: Option<HealingContent>,
    pub error_message: Option<String>,
    pub history_log_id: Option<String>,
    pub loading_message: Option<String>,
    /// Bumped on every request start and reset; a resolution is applied only
    /// while this still matches the value it started with.
    pub generation: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.status == GenerationStatus::Pending
    }

    /// Enter `Pending` for `mood`. A fresh selection drops previous content;
    /// a refresh keeps it so a failed refresh can fall back to it.
    pub fn begin_request(&mut self, mood: Mood, history_log_id: String, keep_content: bool) -> u64 {
        self.generation += 1;
        self.mood = Some(mood);
        self.status = GenerationStatus::Pending;
        self.error_message = None;
        self.history_log_id = Some(history_log_id);
        self.loading_message = None;
        if !keep_content {
            self.content = None;
        }
        self.generation
    }

    pub fn succeed(&mut self, content: HealingContent) {
        self.status = GenerationStatus::Success;
        self.content = Some(content);
        self.error_message = None;
        self.loading_message = None;
    }

    /// Without earlier content the mood is cleared, sending the user back to
    /// the picker. Earlier content is left in place.
    pub fn fail(&mut self, message: String) {
        self.status = GenerationStatus::Failed;
        self.error_message = Some(message);
        self.loading_message = None;
        if self.content.is_none() {
            self.mood = None;
        }
    }

    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }
}
