use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{Mood, ProfileStatus};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_mood(value: &str) -> Result<Mood> {
    value.parse::<Mood>()
}

pub fn parse_status(value: &str) -> Result<ProfileStatus> {
    ProfileStatus::parse(value)
}
