use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::query::ContentQuery;
use crate::db::repository::ContentRepository;
use crate::error::AppResult;
use crate::models::{ContentItem, EngagementKind};

/// Content store held in process memory.
///
/// Evaluates [`ContentQuery`] exactly as the Postgres adapter does and counts
/// the queries it serves, which lets tests assert on cache behaviour.
#[derive(Clone, Default)]
pub struct InMemoryContentRepository {
    items: Arc<RwLock<Vec<ContentItem>>>,
    queries: Arc<AtomicUsize>,
}

impl InMemoryContentRepository {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adds or replaces an item by id
    pub async fn upsert(&self, item: ContentItem) {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    pub async fn get(&self, content_id: i64) -> Option<ContentItem> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.id == content_id)
            .cloned()
    }

    /// Number of `find` calls served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn find(&self, query: ContentQuery) -> AppResult<Vec<ContentItem>> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let items = self.items.read().await;
        let mut matching: Vec<ContentItem> = items
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));

        Ok(matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn record_engagement(&self, content_id: i64, kind: EngagementKind) -> AppResult<bool> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|item| item.id == content_id) {
            Some(item) => {
                item.engagement_score += kind.weight();
                item.view_count += kind.views();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::{Predicate, SCOPED_FEED_ORDER};
    use crate::models::{ContentLocation, CreatorType};
    use chrono::Utc;

    fn item(id: i64, engagement: f64, active: bool) -> ContentItem {
        ContentItem {
            id,
            title: format!("Listing {id}"),
            content_type: "video".to_string(),
            creator_type: CreatorType::Developer,
            creator_id: Some(5),
            agency_id: None,
            engagement_score: engagement,
            view_count: 0,
            created_at: Utc::now(),
            price_range: None,
            property_type: None,
            lifestyle_categories: Default::default(),
            location: ContentLocation::default(),
            video_url: None,
            thumbnail_url: None,
            is_featured: false,
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_find_filters_orders_and_pages() {
        let repo = InMemoryContentRepository::new(vec![
            item(1, 1.0, true),
            item(2, 3.0, true),
            item(3, 2.0, true),
            item(4, 9.0, false),
        ]);

        let query = ContentQuery::active()
            .with(Predicate::CreatorIdIs(5))
            .order_by(&SCOPED_FEED_ORDER)
            .page(2, 1);
        let page = repo.find(query).await.unwrap();

        let ids: Vec<i64> = page.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(repo.query_count(), 1);
    }

    #[tokio::test]
    async fn test_record_engagement() {
        let repo = InMemoryContentRepository::new(vec![item(1, 1.0, true)]);

        assert!(repo.record_engagement(1, EngagementKind::View).await.unwrap());
        assert!(repo.record_engagement(1, EngagementKind::Share).await.unwrap());
        assert!(!repo.record_engagement(99, EngagementKind::Like).await.unwrap());

        let updated = repo.get(1).await.unwrap();
        assert!((updated.engagement_score - 3.1).abs() < 1e-9);
        assert_eq!(updated.view_count, 1);
    }
}
