use super::model::{USERS_COLLECTION, UserProfile, profile_field};
use crate::error::{FocusError, Result};
use crate::store::{DocumentStore, FieldValue, Fields};
use serde_json::json;
use std::sync::Arc;

/// Reads and creates user profiles.
pub struct UserProfiles {
    store: Arc<dyn DocumentStore>,
}

impl UserProfiles {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Creates the zeroed profile written at signup.
    pub async fn create_profile(&self, user_id: &str, username: &str, email: &str) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert(profile_field::USERNAME.into(), json!(username).into());
        fields.insert(profile_field::EMAIL.into(), json!(email).into());
        fields.insert(profile_field::TOTAL_HOURS.into(), json!(0.0).into());
        fields.insert(profile_field::VIOLATIONS.into(), json!(0).into());
        fields.insert(profile_field::SESSIONS_COMPLETED.into(), json!(0).into());
        fields.insert(profile_field::CREATED_AT.into(), FieldValue::ServerTimestamp);

        self.store
            .set_document(USERS_COLLECTION, user_id, fields)
            .await?;
        tracing::info!("[UserProfiles] Created profile for {}", user_id);
        Ok(())
    }

    /// Reads a profile, `None` if the user never signed up.
    pub async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.store
            .get_document(USERS_COLLECTION, user_id)
            .await?
            .map(|doc| UserProfile::from_document(&doc))
            .transpose()
    }

    /// Reads a profile that must exist.
    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.find_profile(user_id)
            .await?
            .ok_or_else(|| FocusError::not_found("UserProfile", user_id))
    }

    /// Display name for messages, falling back to the id.
    pub async fn display_name(&self, user_id: &str) -> Result<String> {
        Ok(self
            .find_profile(user_id)
            .await?
            .map(|p| p.username)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user_id.to_string()))
    }
}
