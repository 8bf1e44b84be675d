use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{ContentItem, FeedItem, UserProfile};

/// Overlays sponsorship onto an assembled feed.
///
/// Implementations may mark items as sponsored or insert promoted items, but
/// every returned item carries an explicit `is_sponsored` flag.
#[async_trait]
pub trait BoostInjector: Send + Sync {
    async fn inject(
        &self,
        items: Vec<ContentItem>,
        profile: &UserProfile,
    ) -> AppResult<Vec<FeedItem>>;
}

/// Injector used while no boost-campaign source exists: passes every item
/// through unchanged and unsponsored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBoostInjector;

#[async_trait]
impl BoostInjector for NoBoostInjector {
    async fn inject(
        &self,
        items: Vec<ContentItem>,
        _profile: &UserProfile,
    ) -> AppResult<Vec<FeedItem>> {
        Ok(items
            .into_iter()
            .map(|content| FeedItem {
                content,
                is_sponsored: false,
            })
            .collect())
    }
}
