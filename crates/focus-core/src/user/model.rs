//! UserProfile domain model.

use crate::error::Result;
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store collection holding profiles, keyed by user id.
pub const USERS_COLLECTION: &str = "users";

/// Stored field names of a profile document.
pub mod profile_field {
    pub const USERNAME: &str = "username";
    pub const EMAIL: &str = "email";
    pub const TOTAL_HOURS: &str = "totalHours";
    pub const VIOLATIONS: &str = "violations";
    pub const SESSIONS_COMPLETED: &str = "sessionsCompleted";
    pub const CREATED_AT: &str = "createdAt";
}

/// Cumulative participant record.
///
/// Created at signup; afterwards only stats reconciliation changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Document id (the user id)
    #[serde(skip)]
    pub user_id: String,
    pub username: String,
    pub email: String,
    /// Hours from successful sessions only
    #[serde(default)]
    pub total_hours: f64,
    /// Violation seconds across all sessions, whatever their outcome
    #[serde(default)]
    pub violations: u64,
    /// Successful sessions
    #[serde(default)]
    pub sessions_completed: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn from_document(document: &Document) -> Result<Self> {
        let mut profile: UserProfile = document.decode()?;
        profile.user_id = document.id.clone();
        Ok(profile)
    }
}
