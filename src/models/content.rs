use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kind of account that published a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatorType {
    Agent,
    Developer,
    Agency,
    Unknown,
}

impl CreatorType {
    /// Maps a stored tag to a creator type; anything unrecognised is `Unknown`
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "agent" => CreatorType::Agent,
            "developer" => CreatorType::Developer,
            "agency" => CreatorType::Agency,
            _ => CreatorType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreatorType::Agent => "agent",
            CreatorType::Developer => "developer",
            CreatorType::Agency => "agency",
            CreatorType::Unknown => "unknown",
        }
    }
}

/// Inclusive price band, in the listing currency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    /// Builds a range only when both bounds are present and finite.
    /// Reversed bounds are swapped.
    pub fn from_bounds(min: Option<f64>, max: Option<f64>) -> Option<Self> {
        match (min, max) {
            (Some(min), Some(max)) if min.is_finite() && max.is_finite() => Some(Self {
                min: min.min(max),
                max: min.max(max),
            }),
            _ => None,
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Length of the intersection of two ranges, zero when they are disjoint
    pub fn overlap(&self, other: &PriceRange) -> f64 {
        (self.max.min(other.max) - self.min.max(other.min)).max(0.0)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn intersects(&self, other: &PriceRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometres (haversine)
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Where a listing is, as far as the store knows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentLocation {
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub coordinates: Option<GeoPoint>,
}

impl ContentLocation {
    /// Case-insensitive substring match over suburb, city and province
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        [&self.suburb, &self.city, &self.province]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// A candidate feed entry (a property video or listing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub content_type: String,
    pub creator_type: CreatorType,
    pub creator_id: Option<i64>,
    pub agency_id: Option<i64>,
    pub engagement_score: f64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub price_range: Option<PriceRange>,
    pub property_type: Option<String>,
    pub lifestyle_categories: BTreeSet<String>,
    pub location: ContentLocation,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
}

/// Raw row shape of the `explore_content` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentRow {
    pub id: i64,
    pub title: String,
    pub content_type: String,
    pub creator_type: Option<String>,
    pub creator_id: Option<i64>,
    pub agency_id: Option<i64>,
    pub engagement_score: Option<f64>,
    pub view_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub property_type: Option<String>,
    pub lifestyle_categories: Option<Vec<String>>,
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
}

impl From<ContentRow> for ContentItem {
    fn from(row: ContentRow) -> Self {
        let engagement_score = row
            .engagement_score
            .filter(|score| score.is_finite())
            .unwrap_or(0.0)
            .max(0.0);

        let coordinates = match (row.latitude, row.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(GeoPoint::new(lat, lng))
            }
            _ => None,
        };

        ContentItem {
            id: row.id,
            title: row.title,
            content_type: row.content_type,
            creator_type: row
                .creator_type
                .as_deref()
                .map(CreatorType::from_tag)
                .unwrap_or(CreatorType::Unknown),
            creator_id: row.creator_id,
            agency_id: row.agency_id,
            engagement_score,
            view_count: row.view_count.unwrap_or(0).max(0),
            created_at: row.created_at,
            price_range: PriceRange::from_bounds(row.price_min, row.price_max),
            property_type: row.property_type,
            lifestyle_categories: row
                .lifestyle_categories
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            location: ContentLocation {
                suburb: row.suburb,
                city: row.city,
                province: row.province,
                coordinates,
            },
            video_url: row.video_url,
            thumbnail_url: row.thumbnail_url,
            is_featured: row.is_featured,
            is_active: row.is_active,
        }
    }
}
