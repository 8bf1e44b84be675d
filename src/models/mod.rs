pub mod content;
pub mod feed;
pub mod user_profile;

pub use content::{ContentItem, ContentLocation, ContentRow, CreatorType, GeoPoint, PriceRange};
pub use feed::{FeedFilters, FeedItem, FeedOptions, FeedRequestContext, FeedResult, FeedType};
pub use user_profile::{PreferenceRecord, UserProfile};

use serde::{Deserialize, Serialize};

/// Interaction a viewer had with a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    View,
    Like,
    Save,
    Share,
}

impl EngagementKind {
    /// Amount added to the item's engagement score
    pub fn weight(&self) -> f64 {
        match self {
            EngagementKind::View => 0.1,
            EngagementKind::Like => 1.0,
            EngagementKind::Save => 1.5,
            EngagementKind::Share => 2.0,
        }
    }

    /// Amount added to the item's view count
    pub fn views(&self) -> i64 {
        match self {
            EngagementKind::View => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_kind_serialization() {
        let kind: EngagementKind = serde_json::from_str("\"share\"").unwrap();
        assert_eq!(kind, EngagementKind::Share);
        assert_eq!(serde_json::to_string(&EngagementKind::View).unwrap(), "\"view\"");
    }

    #[test]
    fn test_only_views_count_as_views() {
        assert_eq!(EngagementKind::View.views(), 1);
        assert_eq!(EngagementKind::Like.views(), 0);
        assert!(EngagementKind::Share.weight() > EngagementKind::Like.weight());
    }
}
