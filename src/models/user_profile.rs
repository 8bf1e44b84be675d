use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::PriceRange;

/// Read-mostly projection of a user's stored preferences.
///
/// Every collection is always present (possibly empty) so scoring code can
/// iterate without checking for absence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub price_range: Option<PriceRange>,
    pub preferred_locations: BTreeSet<String>,
    pub preferred_property_types: BTreeSet<String>,
    pub preferred_categories: BTreeSet<String>,
    pub followed_neighbourhoods: BTreeSet<i64>,
    pub followed_creators: BTreeSet<i64>,
}

impl UserProfile {
    /// Profile synthesized for users without a preference record
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn follows_creator(&self, creator_id: Option<i64>) -> bool {
        creator_id.is_some_and(|id| self.followed_creators.contains(&id))
    }
}

/// Raw row shape of the `user_preferences` table
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct PreferenceRecord {
    pub user_id: i64,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub preferred_locations: Option<Vec<String>>,
    pub preferred_property_types: Option<Vec<String>>,
    pub lifestyle_categories: Option<Vec<String>>,
    pub followed_neighbourhoods: Option<Vec<i64>>,
    pub followed_creators: Option<Vec<i64>>,
}

fn normalize_tags(tags: Option<Vec<String>>) -> BTreeSet<String> {
    tags.unwrap_or_default()
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl From<PreferenceRecord> for UserProfile {
    fn from(record: PreferenceRecord) -> Self {
        UserProfile {
            user_id: record.user_id,
            price_range: PriceRange::from_bounds(record.price_min, record.price_max),
            preferred_locations: normalize_tags(record.preferred_locations),
            preferred_property_types: normalize_tags(record.preferred_property_types),
            preferred_categories: normalize_tags(record.lifestyle_categories),
            followed_neighbourhoods: record
                .followed_neighbourhoods
                .unwrap_or_default()
                .into_iter()
                .collect(),
            followed_creators: record.followed_creators.unwrap_or_default().into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile() {
        let profile = UserProfile::empty(42);
        assert_eq!(profile.user_id, 42);
        assert!(profile.price_range.is_none());
        assert!(profile.preferred_categories.is_empty());
        assert!(profile.followed_creators.is_empty());
        assert!(!profile.follows_creator(Some(1)));
        assert!(!profile.follows_creator(None));
    }

    #[test]
    fn test_record_with_null_columns() {
        let profile: UserProfile = PreferenceRecord {
            user_id: 5,
            price_min: Some(1_000_000.0),
            ..PreferenceRecord::default()
        }
        .into();

        assert_eq!(profile, UserProfile::empty(5));
    }

    #[test]
    fn test_record_mapping() {
        let profile: UserProfile = PreferenceRecord {
            user_id: 9,
            price_min: Some(1.0),
            price_max: Some(2.0),
            preferred_locations: Some(vec!["Sandton".to_string()]),
            preferred_property_types: None,
            lifestyle_categories: Some(vec!["Golf Estate".to_string(), "".to_string()]),
            followed_neighbourhoods: Some(vec![3]),
            followed_creators: Some(vec![11, 11, 12]),
        }
        .into();

        assert_eq!(profile.price_range, Some(PriceRange { min: 1.0, max: 2.0 }));
        assert!(profile.preferred_locations.contains("sandton"));
        assert_eq!(profile.preferred_categories.len(), 1);
        assert_eq!(profile.followed_creators.len(), 2);
        assert!(profile.follows_creator(Some(12)));
    }
}
