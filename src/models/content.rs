use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generated reflective content. The payload shape belongs to the generator
/// and is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct HealingContent {
    payload: Value,
}

impl HealingContent {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
