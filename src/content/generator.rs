use async_trait::async_trait;

use crate::{
    error::CoreError,
    models::{HealingContent, Mood},
};

/// Produces reflective content for a mood. Failures should carry a
/// descriptive message; it is shown to the user as-is.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, mood: Mood) -> Result<HealingContent, CoreError>;
}
