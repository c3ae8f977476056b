use thiserror::Error;

/// Failures reported by the external collaborators the core talks to.
///
/// Each variant is caught where the call was issued and mapped to a fail-safe
/// state; none of them escape the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("identity provider unreachable: {0}")]
    AuthTransport(String),
    #[error("failed to read profile: {0}")]
    ProfileRead(String),
    #[error("failed to write profile: {0}")]
    ProfileWrite(String),
    #[error("{0}")]
    Generation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Text suitable for display; `None` when the error carries no usable message.
    pub fn user_message(&self) -> Option<&str> {
        let message = match self {
            CoreError::AuthTransport(m)
            | CoreError::ProfileRead(m)
            | CoreError::ProfileWrite(m)
            | CoreError::Generation(m)
            | CoreError::Storage(m) => m.as_str(),
        };
        let trimmed = message.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Storage(format!("{err:#}"))
    }
}
