//! Declarative content queries.
//!
//! A [`ContentQuery`] is a flat list of predicates plus an ordering and a
//! page window. Feed code assembles one up front and hands it to a
//! [`crate::db::ContentRepository`] in a single call; the same query can be
//! evaluated in memory with [`ContentQuery::matches`] and
//! [`ContentQuery::compare`].

use std::cmp::Ordering;

use crate::models::{ContentItem, CreatorType, PriceRange};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    ActiveOnly,
    ContentTypeIs(String),
    CreatorTypeIs(CreatorType),
    CreatorIdIs(i64),
    AgencyIs(i64),
    /// Case-insensitive substring over suburb, city and province
    LocationMatches(String),
    LocationMatchesAny(Vec<String>),
    CategoryContains(String),
    CategoryAny(Vec<String>),
    PropertyTypeIn(Vec<String>),
    PriceOverlaps(PriceRange),
    ExcludeIds(Vec<i64>),
}

impl Predicate {
    pub fn matches(&self, item: &ContentItem) -> bool {
        match self {
            Predicate::ActiveOnly => item.is_active,
            Predicate::ContentTypeIs(content_type) => {
                item.content_type.eq_ignore_ascii_case(content_type)
            }
            Predicate::CreatorTypeIs(creator_type) => item.creator_type == *creator_type,
            Predicate::CreatorIdIs(id) => item.creator_id == Some(*id),
            Predicate::AgencyIs(id) => item.agency_id == Some(*id),
            Predicate::LocationMatches(needle) => item.location.matches(needle),
            Predicate::LocationMatchesAny(needles) => {
                needles.iter().any(|needle| item.location.matches(needle))
            }
            Predicate::CategoryContains(category) => {
                let category = category.trim().to_lowercase();
                item.lifestyle_categories
                    .iter()
                    .any(|c| c.to_lowercase() == category)
            }
            Predicate::CategoryAny(categories) => categories.iter().any(|category| {
                Predicate::CategoryContains(category.clone()).matches(item)
            }),
            Predicate::PropertyTypeIn(types) => item.property_type.as_deref().is_some_and(|t| {
                types.iter().any(|wanted| wanted.eq_ignore_ascii_case(t))
            }),
            Predicate::PriceOverlaps(range) => item
                .price_range
                .is_some_and(|item_range| item_range.intersects(range)),
            Predicate::ExcludeIds(ids) => !ids.contains(&item.id),
        }
    }
}

/// Descending sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Featured,
    Engagement,
    Views,
    Recency,
}

impl SortKey {
    /// Orders `a` before `b` when `a` ranks higher
    pub fn compare(&self, a: &ContentItem, b: &ContentItem) -> Ordering {
        match self {
            SortKey::Featured => b.is_featured.cmp(&a.is_featured),
            SortKey::Engagement => b.engagement_score.total_cmp(&a.engagement_score),
            SortKey::Views => b.view_count.cmp(&a.view_count),
            SortKey::Recency => b.created_at.cmp(&a.created_at),
        }
    }
}

/// Candidate ordering for the personalized pipeline
pub const CANDIDATE_ORDER: [SortKey; 4] = [
    SortKey::Featured,
    SortKey::Engagement,
    SortKey::Views,
    SortKey::Recency,
];

/// Ordering of the type-scoped feeds (area, category, creator)
pub const SCOPED_FEED_ORDER: [SortKey; 3] =
    [SortKey::Featured, SortKey::Engagement, SortKey::Recency];

#[derive(Debug, Clone, PartialEq)]
pub struct ContentQuery {
    pub predicates: Vec<Predicate>,
    pub order: Vec<SortKey>,
    pub limit: u32,
    pub offset: u32,
}

impl ContentQuery {
    /// Starts a query over active content only
    pub fn active() -> Self {
        Self {
            predicates: vec![Predicate::ActiveOnly],
            order: Vec::new(),
            limit: 20,
            offset: 0,
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, keys: &[SortKey]) -> Self {
        self.order = keys.to_vec();
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn matches(&self, item: &ContentItem) -> bool {
        self.predicates.iter().all(|p| p.matches(item))
    }

    /// Applies the sort keys in order, then id descending so every store
    /// returns the same sequence for the same data.
    pub fn compare(&self, a: &ContentItem, b: &ContentItem) -> Ordering {
        self.order
            .iter()
            .map(|key| key.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| b.id.cmp(&a.id))
    }
}
