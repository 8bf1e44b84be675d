use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::repository::PreferenceRepository;
use crate::error::AppResult;
use crate::models::PreferenceRecord;

/// Preference records held in process memory, keyed by user id
#[derive(Clone, Default)]
pub struct InMemoryPreferenceRepository {
    records: Arc<RwLock<HashMap<i64, PreferenceRecord>>>,
}

impl InMemoryPreferenceRepository {
    pub fn new(records: Vec<PreferenceRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(
                records.into_iter().map(|r| (r.user_id, r)).collect(),
            )),
        }
    }

    pub async fn upsert(&self, record: PreferenceRecord) {
        self.records.write().await.insert(record.user_id, record);
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn find_preferences(&self, user_id: i64) -> AppResult<Option<PreferenceRecord>> {
        Ok(self.records.read().await.get(&user_id).cloned())
    }
}
