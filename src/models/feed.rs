use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ContentItem, GeoPoint, PriceRange};
use crate::error::AppError;

/// The feed surfaces the Explore page can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Recommended,
    Area,
    Category,
    Agent,
    Developer,
    Agency,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Recommended => "recommended",
            FeedType::Area => "area",
            FeedType::Category => "category",
            FeedType::Agent => "agent",
            FeedType::Developer => "developer",
            FeedType::Agency => "agency",
        }
    }
}

impl Display for FeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recommended" => Ok(FeedType::Recommended),
            "area" => Ok(FeedType::Area),
            "category" => Ok(FeedType::Category),
            "agent" => Ok(FeedType::Agent),
            "developer" => Ok(FeedType::Developer),
            "agency" => Ok(FeedType::Agency),
            other => Err(AppError::Validation(format!("Unknown feed type: {}", other))),
        }
    }
}

/// Optional narrowing applied to the personalized candidate pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedFilters {
    pub property_types: BTreeSet<String>,
    pub price_range: Option<PriceRange>,
    pub lifestyle_categories: BTreeSet<String>,
    pub locations: BTreeSet<String>,
}

impl FeedFilters {
    pub fn is_empty(&self) -> bool {
        self.property_types.is_empty()
            && self.price_range.is_none()
            && self.lifestyle_categories.is_empty()
            && self.locations.is_empty()
    }
}

/// Parameters accepted by the feed router
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedOptions {
    pub user_id: Option<i64>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub agent_id: Option<i64>,
    pub developer_id: Option<i64>,
    pub agency_id: Option<i64>,
    pub coordinates: Option<GeoPoint>,
    pub session_history: BTreeSet<i64>,
    pub filters: FeedFilters,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Per-request input of the personalized pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedRequestContext {
    /// `None` for guest requests
    pub user_id: Option<i64>,
    /// Content already shown this session; never returned again
    pub session_history: BTreeSet<i64>,
    pub location: Option<GeoPoint>,
    pub filters: FeedFilters,
    pub limit: u32,
    pub offset: u32,
}

impl FeedRequestContext {
    pub fn from_options(options: &FeedOptions, limit: u32) -> Self {
        Self {
            user_id: options.user_id,
            session_history: options.session_history.clone(),
            location: options.coordinates,
            filters: options.filters.clone(),
            limit,
            offset: options.offset,
        }
    }

    /// Deterministic encoding of everything besides user, limit and offset
    /// that changes the personalized result. Used inside cache keys.
    ///
    /// Free-text values are escaped, so distinct contexts never share an
    /// encoding.
    pub fn fingerprint(&self) -> String {
        let mut parts = Vec::new();

        if !self.session_history.is_empty() {
            let ids: Vec<String> = self.session_history.iter().map(i64::to_string).collect();
            parts.push(format!("seen={}", ids.join(",")));
        }
        if let Some(point) = self.location {
            parts.push(format!("near={},{}", point.lat, point.lng));
        }
        if !self.filters.property_types.is_empty() {
            parts.push(format!("types={}", join_escaped(&self.filters.property_types)));
        }
        if let Some(range) = self.filters.price_range {
            parts.push(format!("price={},{}", range.min, range.max));
        }
        if !self.filters.lifestyle_categories.is_empty() {
            parts.push(format!("cats={}", join_escaped(&self.filters.lifestyle_categories)));
        }
        if !self.filters.locations.is_empty() {
            parts.push(format!("areas={}", join_escaped(&self.filters.locations)));
        }

        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join(";")
        }
    }
}

/// Percent-escapes the characters cache keys use as separators
pub fn escape_key_segment(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' | ';' | '=' | ',' | ':' => escaped.push_str(&format!("%{:02X}", c as u32)),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn join_escaped(values: &BTreeSet<String>) -> String {
    values
        .iter()
        .map(|v| escape_key_segment(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// A feed entry as returned to clients, with its sponsorship marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub content: ContentItem,
    pub is_sponsored: bool,
}

/// One page of a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResult {
    pub shorts: Vec<FeedItem>,
    pub feed_type: FeedType,
    pub has_more: bool,
    /// Offset of the next page
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl FeedResult {
    /// Wraps a page. `has_more` is set when the page was filled exactly,
    /// so a pool that ends on a page boundary still reports more.
    pub fn page(
        feed_type: FeedType,
        shorts: Vec<FeedItem>,
        limit: u32,
        offset: u32,
        metadata: Option<BTreeMap<String, Value>>,
    ) -> Self {
        let count = shorts.len() as u32;
        Self {
            has_more: count == limit,
            offset: offset.saturating_add(count),
            shorts,
            feed_type,
            metadata,
        }
    }
}
