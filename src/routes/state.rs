use std::sync::Arc;

use crate::db::memory::{
    InMemoryContentRepository, InMemoryPreferenceRepository, MemoryCacheStore,
};
use crate::db::Cache;
use crate::models::{ContentItem, PreferenceRecord};
use crate::services::{FeedService, FeedSettings, NoBoostInjector, ProfileProvider};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub feeds: FeedService,
}

impl AppState {
    pub fn new(feeds: FeedService) -> Self {
        Self { feeds }
    }

    /// State backed entirely by in-process stores, seeded with the given records
    pub fn in_memory(
        content: Vec<ContentItem>,
        preferences: Vec<PreferenceRecord>,
        settings: FeedSettings,
    ) -> Self {
        let profiles = ProfileProvider::new(Arc::new(InMemoryPreferenceRepository::new(
            preferences,
        )));
        let feeds = FeedService::new(
            Arc::new(InMemoryContentRepository::new(content)),
            profiles,
            Arc::new(NoBoostInjector),
            Cache::new(Arc::new(MemoryCacheStore::new())),
            settings,
        );
        Self { feeds }
    }
}
