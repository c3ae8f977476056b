use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Mood;

/// Marks that a mood was selected at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLogEntry {
    pub id: String,
    pub mood: Mood,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
}

impl HistoryLogEntry {
    pub fn new(mood: Mood) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mood,
            timestamp: Utc::now(),
            note: None,
        }
    }
}
