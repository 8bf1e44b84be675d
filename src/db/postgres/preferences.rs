use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::repository::PreferenceRepository;
use crate::error::AppResult;
use crate::models::PreferenceRecord;

/// Preference lookups over the `user_preferences` table
#[derive(Clone)]
pub struct PgPreferenceRepository {
    pool: PgPool,
}

impl PgPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    async fn find_preferences(&self, user_id: i64) -> AppResult<Option<PreferenceRecord>> {
        let record = sqlx::query_as::<_, PreferenceRecord>(
            "SELECT user_id, price_min, price_max, preferred_locations, \
             preferred_property_types, lifestyle_categories, followed_neighbourhoods, \
             followed_creators FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
