//! Personalized relevance scoring.
//!
//! A score is the sum of six independent factors, each capped so that no
//! single signal can dominate. Missing data makes a factor contribute 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ContentItem, FeedRequestContext, GeoPoint, PriceRange, UserProfile};

/// Tunable caps and scales of the scoring factors.
/// The defaults sum to a maximum score of 100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub engagement_multiplier: f64,
    pub engagement_cap: f64,
    pub price_overlap_cap: f64,
    pub category_match: f64,
    pub followed_creator: f64,
    pub recency_cap: f64,
    pub recency_window_days: i64,
    pub proximity_cap: f64,
    pub proximity_radius_km: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            engagement_multiplier: 4.0,
            engagement_cap: 40.0,
            price_overlap_cap: 20.0,
            category_match: 15.0,
            followed_creator: 10.0,
            recency_cap: 10.0,
            recency_window_days: 7,
            proximity_cap: 5.0,
            proximity_radius_km: 50.0,
        }
    }
}

impl ScoringWeights {
    pub fn max_score(&self) -> f64 {
        self.engagement_cap
            + self.price_overlap_cap
            + self.category_match
            + self.followed_creator
            + self.recency_cap
            + self.proximity_cap
    }
}

/// Per-factor contributions of one item's score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub engagement: f64,
    pub price_overlap: f64,
    pub category_match: f64,
    pub followed_creator: f64,
    pub recency: f64,
    pub proximity: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.engagement
            + self.price_overlap
            + self.category_match
            + self.followed_creator
            + self.recency
            + self.proximity
    }
}

/// Keeps a factor finite and within `[0, cap]`
fn bounded(value: f64, cap: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, cap.max(0.0))
    } else {
        0.0
    }
}

pub fn engagement_points(engagement_score: f64, weights: &ScoringWeights) -> f64 {
    bounded(
        engagement_score * weights.engagement_multiplier,
        weights.engagement_cap,
    )
}

/// Share of the user's budget band covered by the item's price band.
///
/// A zero-width band (min == max) earns the full cap when the item's band
/// contains that price.
pub fn price_overlap_points(
    user: Option<&PriceRange>,
    item: Option<&PriceRange>,
    weights: &ScoringWeights,
) -> f64 {
    let (Some(user), Some(item)) = (user, item) else {
        return 0.0;
    };

    let width = user.width();
    let fraction = if width > 0.0 {
        user.overlap(item) / width
    } else if item.contains(user.min) {
        1.0
    } else {
        0.0
    };

    bounded(fraction * weights.price_overlap_cap, weights.price_overlap_cap)
}

pub fn category_points(item: &ContentItem, profile: &UserProfile, weights: &ScoringWeights) -> f64 {
    let matched = item
        .lifestyle_categories
        .iter()
        .any(|c| profile.preferred_categories.contains(c));
    if matched {
        bounded(weights.category_match, weights.category_match)
    } else {
        0.0
    }
}

pub fn followed_creator_points(
    item: &ContentItem,
    profile: &UserProfile,
    weights: &ScoringWeights,
) -> f64 {
    if profile.follows_creator(item.creator_id) {
        bounded(weights.followed_creator, weights.followed_creator)
    } else {
        0.0
    }
}

/// Linear decay over whole elapsed days; items from the future count as new
pub fn recency_points(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    weights: &ScoringWeights,
) -> f64 {
    let window = weights.recency_window_days;
    if window <= 0 {
        return 0.0;
    }

    let days = (now - created_at).num_days().max(0);
    if days > window {
        return 0.0;
    }

    bounded(
        weights.recency_cap * (1.0 - days as f64 / window as f64),
        weights.recency_cap,
    )
}

pub fn proximity_points(
    origin: Option<&GeoPoint>,
    target: Option<&GeoPoint>,
    weights: &ScoringWeights,
) -> f64 {
    let (Some(origin), Some(target)) = (origin, target) else {
        return 0.0;
    };
    if weights.proximity_radius_km <= 0.0 {
        return 0.0;
    }

    let distance = origin.distance_km(target);
    if !distance.is_finite() || distance >= weights.proximity_radius_km {
        return 0.0;
    }

    bounded(
        weights.proximity_cap * (1.0 - distance / weights.proximity_radius_km),
        weights.proximity_cap,
    )
}

/// Scores one candidate.
///
/// `profile` is `None` for guests, who only get the engagement and recency
/// factors.
pub fn score_item(
    item: &ContentItem,
    profile: Option<&UserProfile>,
    context: &FeedRequestContext,
    now: DateTime<Utc>,
    weights: &ScoringWeights,
) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown {
        engagement: engagement_points(item.engagement_score, weights),
        recency: recency_points(item.created_at, now, weights),
        ..ScoreBreakdown::default()
    };

    if let Some(profile) = profile {
        breakdown.price_overlap = price_overlap_points(
            profile.price_range.as_ref(),
            item.price_range.as_ref(),
            weights,
        );
        breakdown.category_match = category_points(item, profile, weights);
        breakdown.followed_creator = followed_creator_points(item, profile, weights);
        breakdown.proximity = proximity_points(
            context.location.as_ref(),
            item.location.coordinates.as_ref(),
            weights,
        );
    }

    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentLocation, CreatorType};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn bare_item() -> ContentItem {
        ContentItem {
            id: 1,
            title: "Bare".to_string(),
            content_type: "video".to_string(),
            creator_type: CreatorType::Unknown,
            creator_id: None,
            agency_id: None,
            engagement_score: 0.0,
            view_count: 0,
            created_at: now() - Duration::days(30),
            price_range: None,
            property_type: None,
            lifestyle_categories: Default::default(),
            location: ContentLocation::default(),
            video_url: None,
            thumbnail_url: None,
            is_featured: false,
            is_active: true,
        }
    }

    #[test]
    fn test_engagement_is_scaled_and_capped() {
        let w = ScoringWeights::default();
        assert_eq!(engagement_points(2.5, &w), 10.0);
        assert_eq!(engagement_points(25.0, &w), 40.0);
        assert_eq!(engagement_points(-3.0, &w), 0.0);
        assert_eq!(engagement_points(f64::NAN, &w), 0.0);
        assert_eq!(engagement_points(f64::INFINITY, &w), 0.0);
    }

    #[test]
    fn test_price_overlap_fraction() {
        let w = ScoringWeights::default();
        let user = PriceRange {
            min: 1_000_000.0,
            max: 2_000_000.0,
        };
        let half = PriceRange {
            min: 1_500_000.0,
            max: 3_000_000.0,
        };
        let disjoint = PriceRange {
            min: 2_500_000.0,
            max: 3_000_000.0,
        };
        let covering = PriceRange {
            min: 0.0,
            max: 5_000_000.0,
        };

        assert_eq!(price_overlap_points(Some(&user), Some(&half), &w), 10.0);
        assert_eq!(price_overlap_points(Some(&user), Some(&disjoint), &w), 0.0);
        assert_eq!(price_overlap_points(Some(&user), Some(&covering), &w), 20.0);
        assert_eq!(price_overlap_points(None, Some(&half), &w), 0.0);
        assert_eq!(price_overlap_points(Some(&user), None, &w), 0.0);
    }

    #[test]
    fn test_zero_width_budget_is_guarded() {
        let w = ScoringWeights::default();
        let point = PriceRange { min: 5.0, max: 5.0 };
        let around = PriceRange { min: 1.0, max: 10.0 };
        let elsewhere = PriceRange { min: 6.0, max: 10.0 };

        assert_eq!(price_overlap_points(Some(&point), Some(&around), &w), 20.0);
        assert_eq!(price_overlap_points(Some(&point), Some(&elsewhere), &w), 0.0);
    }

    #[test]
    fn test_recency_decays_over_a_week() {
        let w = ScoringWeights::default();
        assert_eq!(recency_points(now(), now(), &w), 10.0);
        // 23 hours is still day zero
        assert_eq!(recency_points(now() - Duration::hours(23), now(), &w), 10.0);
        let three_days = recency_points(now() - Duration::days(3), now(), &w);
        assert!((three_days - 10.0 * (1.0 - 3.0 / 7.0)).abs() < 1e-9);
        assert_eq!(recency_points(now() - Duration::days(7), now(), &w), 0.0);
        assert_eq!(recency_points(now() - Duration::days(8), now(), &w), 0.0);
        assert_eq!(recency_points(now() + Duration::days(2), now(), &w), 10.0);
    }

    #[test]
    fn test_proximity_within_radius() {
        let w = ScoringWeights::default();
        let sandton = GeoPoint::new(-26.1076, 28.0567);
        let rosebank = GeoPoint::new(-26.1452, 28.0436);
        let durban = GeoPoint::new(-29.8587, 31.0218);

        assert_eq!(proximity_points(Some(&sandton), Some(&sandton), &w), 5.0);
        let near = proximity_points(Some(&sandton), Some(&rosebank), &w);
        assert!(near > 4.0 && near < 5.0, "near was {near}");
        assert_eq!(proximity_points(Some(&sandton), Some(&durban), &w), 0.0);
        assert_eq!(proximity_points(None, Some(&durban), &w), 0.0);
    }

    #[test]
    fn test_full_match_reaches_maximum() {
        let w = ScoringWeights::default();
        let spot = GeoPoint::new(-33.9, 18.4);

        let mut item = bare_item();
        item.engagement_score = 50.0;
        item.created_at = now();
        item.creator_id = Some(8);
        item.price_range = Some(PriceRange { min: 0.0, max: 10.0 });
        item.lifestyle_categories.insert("beach".to_string());
        item.location.coordinates = Some(spot);

        let mut profile = UserProfile::empty(1);
        profile.price_range = Some(PriceRange { min: 2.0, max: 4.0 });
        profile.preferred_categories.insert("beach".to_string());
        profile.followed_creators.insert(8);

        let context = FeedRequestContext {
            user_id: Some(1),
            location: Some(spot),
            ..Default::default()
        };

        let breakdown = score_item(&item, Some(&profile), &context, now(), &w);
        assert_eq!(breakdown.total(), 100.0);
        assert_eq!(w.max_score(), 100.0);
    }

    #[test]
    fn test_guest_gets_base_factors_only() {
        let w = ScoringWeights::default();
        let mut item = bare_item();
        item.engagement_score = 2.0;
        item.created_at = now();
        item.creator_id = Some(8);

        let mut profile = UserProfile::empty(1);
        profile.followed_creators.insert(8);

        let context = FeedRequestContext::default();
        let guest = score_item(&item, None, &context, now(), &w);
        let member = score_item(&item, Some(&profile), &context, now(), &w);

        assert_eq!(guest.total(), 18.0);
        assert_eq!(member.total(), 28.0);
        assert_eq!(guest.followed_creator, 0.0);
    }

    #[test]
    fn test_missing_data_contributes_nothing() {
        let w = ScoringWeights::default();
        let item = bare_item();

        let mut profile = UserProfile::empty(1);
        profile.price_range = Some(PriceRange { min: 1.0, max: 2.0 });
        profile.preferred_categories.insert("golf".to_string());
        profile.followed_creators.insert(3);

        let context = FeedRequestContext {
            location: Some(GeoPoint::new(0.0, 0.0)),
            ..Default::default()
        };

        let breakdown = score_item(&item, Some(&profile), &context, now(), &w);
        assert_eq!(breakdown, ScoreBreakdown::default());
    }

    /// xorshift64, enough to shuffle inputs deterministically
    struct Rng(u64);

    impl Rng {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn chance(&mut self) -> bool {
            self.next() % 2 == 0
        }

        fn float(&mut self, scale: f64) -> f64 {
            (self.next() % 1_000_000) as f64 / 1_000_000.0 * scale
        }
    }

    #[test]
    fn test_scores_stay_bounded_for_random_partial_records() {
        let w = ScoringWeights::default();
        let mut rng = Rng(0x9E37_79B9_7F4A_7C15);

        for _ in 0..2_000 {
            let mut item = bare_item();
            item.engagement_score = rng.float(30.0);
            item.created_at = now() - Duration::hours((rng.next() % 400) as i64);
            if rng.chance() {
                let a = rng.float(5e6);
                let b = rng.float(5e6);
                item.price_range = PriceRange::from_bounds(Some(a), Some(b));
            }
            if rng.chance() {
                item.location.coordinates =
                    Some(GeoPoint::new(rng.float(2.0) - 34.0, rng.float(2.0) + 18.0));
            }
            if rng.chance() {
                item.lifestyle_categories.insert("beach".to_string());
            }
            if rng.chance() {
                item.creator_id = Some((rng.next() % 4) as i64);
            }

            let mut profile = UserProfile::empty(1);
            if rng.chance() {
                let a = rng.float(5e6);
                profile.price_range = PriceRange::from_bounds(Some(a), Some(a + rng.float(1e6)));
            }
            if rng.chance() {
                profile.preferred_categories.insert("beach".to_string());
            }
            if rng.chance() {
                profile.followed_creators.insert(1);
            }

            let context = FeedRequestContext {
                user_id: Some(1),
                location: rng
                    .chance()
                    .then(|| GeoPoint::new(rng.float(2.0) - 34.0, rng.float(2.0) + 18.0)),
                ..Default::default()
            };

            let b = score_item(&item, Some(&profile), &context, now(), &w);
            let total = b.total();
            assert!(total.is_finite() && (0.0..=100.0).contains(&total), "total was {total}");
            assert!((0.0..=40.0).contains(&b.engagement));
            assert!((0.0..=20.0).contains(&b.price_overlap));
            assert!(b.category_match == 0.0 || b.category_match == 15.0);
            assert!(b.followed_creator == 0.0 || b.followed_creator == 10.0);
            assert!((0.0..=10.0).contains(&b.recency));
            assert!((0.0..=5.0).contains(&b.proximity));
        }
    }
}
