//! Maps approval status to the view a signed-in user may reach.

use serde::{Deserialize, Serialize};

use crate::models::ProfileStatus;

/// Approval status as observed by the core. `Unknown` covers read failures
/// and missing records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AccessStatus {
    Pending,
    Approved,
    Blocked,
    Unknown,
}

impl From<ProfileStatus> for AccessStatus {
    fn from(status: ProfileStatus) -> Self {
        match status {
            ProfileStatus::Pending => AccessStatus::Pending,
            ProfileStatus::Approved => AccessStatus::Approved,
            ProfileStatus::Blocked => AccessStatus::Blocked,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AccessView {
    PendingView,
    BlockedView,
    Granted,
}

impl AccessView {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessView::Granted)
    }
}

/// Pure gate: only an explicit approval grants access.
pub fn evaluate(status: AccessStatus) -> AccessView {
    match status {
        AccessStatus::Approved => AccessView::Granted,
        AccessStatus::Blocked => AccessView::BlockedView,
        AccessStatus::Pending | AccessStatus::Unknown => AccessView::PendingView,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_status() {
        assert_eq!(evaluate(AccessStatus::Pending), AccessView::PendingView);
        assert_eq!(evaluate(AccessStatus::Blocked), AccessView::BlockedView);
        assert_eq!(evaluate(AccessStatus::Approved), AccessView::Granted);
    }

    #[test]
    fn unknown_fails_safe() {
        assert_eq!(evaluate(AccessStatus::Unknown), AccessView::PendingView);
        assert!(!evaluate(AccessStatus::Unknown).is_granted());
    }

    #[test]
    fn converts_stored_status() {
        assert_eq!(
            AccessStatus::from(ProfileStatus::Approved),
            AccessStatus::Approved
        );
    }
}
