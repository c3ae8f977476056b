//! Durable approval-status record, one per identity.
//!
//! The serialized form is the stable record shape shared with the remote
//! store: `{ id, email, displayName, avatarUrl, status, requestedAt }`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::Identity;

const DEFAULT_DISPLAY_NAME: &str = "User";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Pending,
    Approved,
    Blocked,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::Pending => "pending",
            ProfileStatus::Approved => "approved",
            ProfileStatus::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(ProfileStatus::Pending),
            "approved" => Ok(ProfileStatus::Approved),
            "blocked" => Ok(ProfileStatus::Blocked),
            other => Err(anyhow!("unknown profile status {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
    pub status: ProfileStatus,
    /// Epoch milliseconds.
    pub requested_at: i64,
}

impl Profile {
    /// The record written the first time an identity signs in.
    pub fn pending_for(identity: &Identity, requested_at: i64) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone().unwrap_or_default(),
            display_name: identity
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            avatar_url: identity.avatar_url.clone().unwrap_or_default(),
            status: ProfileStatus::Pending,
            requested_at,
        }
    }

    pub fn first_name(&self) -> Option<&str> {
        self.display_name.split_whitespace().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_record_uses_identity_fields() {
        let identity = Identity::new("U1")
            .with_display_name("Aisyah Putri")
            .with_email("aisyah@example.com");
        let profile = Profile::pending_for(&identity, 1_700_000_000_000);

        assert_eq!(profile.id, "U1");
        assert_eq!(profile.status, ProfileStatus::Pending);
        assert_eq!(profile.email, "aisyah@example.com");
        assert_eq!(profile.avatar_url, "");
        assert_eq!(profile.first_name(), Some("Aisyah"));
    }

    #[test]
    fn blank_display_name_falls_back() {
        let identity = Identity::new("U2").with_display_name("   ");
        let profile = Profile::pending_for(&identity, 0);
        assert_eq!(profile.display_name, "User");
    }

    #[test]
    fn serializes_stable_record_shape() {
        let profile = Profile::pending_for(&Identity::new("U1"), 42);
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "U1",
                "email": "",
                "displayName": "User",
                "avatarUrl": "",
                "status": "pending",
                "requestedAt": 42
            })
        );
    }
}
