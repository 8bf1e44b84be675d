use std::sync::Arc;

use crate::db::PreferenceRepository;
use crate::error::AppResult;
use crate::models::UserProfile;

/// Resolves stored preferences into a [`UserProfile`]
#[derive(Clone)]
pub struct ProfileProvider {
    preferences: Arc<dyn PreferenceRepository>,
}

impl ProfileProvider {
    pub fn new(preferences: Arc<dyn PreferenceRepository>) -> Self {
        Self { preferences }
    }

    /// Returns the user's profile, or an empty one when no record exists.
    /// Only store failures are errors.
    pub async fn get_user_profile(&self, user_id: i64) -> AppResult<UserProfile> {
        match self.preferences.find_preferences(user_id).await? {
            Some(record) => Ok(UserProfile::from(record)),
            None => {
                tracing::debug!(user_id, "No preference record, using empty profile");
                Ok(UserProfile::empty(user_id))
            }
        }
    }
}
