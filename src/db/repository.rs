use async_trait::async_trait;

use super::query::ContentQuery;
use crate::error::AppResult;
use crate::models::{ContentItem, EngagementKind, PreferenceRecord};

/// Read/write access to feed content.
///
/// Implementations must honour every predicate, the sort keys in order, and
/// the page window. Failures are returned as-is; callers do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn find(&self, query: ContentQuery) -> AppResult<Vec<ContentItem>>;

    /// Adds an engagement event to a content item's counters.
    /// Returns `false` when no item has that id.
    async fn record_engagement(&self, content_id: i64, kind: EngagementKind) -> AppResult<bool>;
}

/// Lookup of stored user preference records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn find_preferences(&self, user_id: i64) -> AppResult<Option<PreferenceRecord>>;
}
