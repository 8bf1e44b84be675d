use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{EngagementKind, FeedFilters, FeedOptions, FeedResult, FeedType, GeoPoint, PriceRange},
};

use super::AppState;

/// Query string of a feed request. List parameters are comma-separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub user_id: Option<i64>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub agent_id: Option<i64>,
    pub developer_id: Option<i64>,
    pub agency_id: Option<i64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub exclude: Option<String>,
    pub property_types: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub categories: Option<String>,
    pub areas: Option<String>,
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

fn tag_set(raw: Option<&str>) -> BTreeSet<String> {
    split_list(raw).map(str::to_lowercase).collect()
}

fn parse_exclude(raw: Option<&str>) -> AppResult<BTreeSet<i64>> {
    split_list(raw)
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                AppError::Validation(format!("Invalid content id in exclude: {}", part))
            })
        })
        .collect()
}

fn parse_coordinates(lat: Option<f64>, lng: Option<f64>) -> AppResult<Option<GeoPoint>> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng))
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
        {
            Ok(Some(GeoPoint::new(lat, lng)))
        }
        (Some(_), Some(_)) => Err(AppError::Validation(
            "Coordinates out of range".to_string(),
        )),
        _ => Err(AppError::Validation(
            "lat and lng must be provided together".to_string(),
        )),
    }
}

impl TryFrom<FeedQuery> for FeedOptions {
    type Error = AppError;

    fn try_from(query: FeedQuery) -> AppResult<Self> {
        let price_range = match (query.min_price, query.max_price) {
            (None, None) => None,
            (min, max) => Some(PriceRange::from_bounds(min, max).ok_or_else(|| {
                AppError::Validation("minPrice and maxPrice must be provided together".to_string())
            })?),
        };

        let filters = FeedFilters {
            property_types: tag_set(query.property_types.as_deref()),
            price_range,
            lifestyle_categories: tag_set(query.categories.as_deref()),
            locations: split_list(query.areas.as_deref())
                .map(str::to_string)
                .collect(),
        };

        Ok(FeedOptions {
            user_id: query.user_id,
            location: query.location,
            category: query.category,
            agent_id: query.agent_id,
            developer_id: query.developer_id,
            agency_id: query.agency_id,
            coordinates: parse_coordinates(query.lat, query.lng)?,
            session_history: parse_exclude(query.exclude.as_deref())?,
            filters,
            limit: query.limit,
            offset: query.offset.unwrap_or(0),
        })
    }
}

/// Handler for every feed type
pub async fn get_feed(
    State(state): State<AppState>,
    Path(feed_type): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<FeedResult>> {
    let feed_type: FeedType = feed_type.parse()?;
    let options = FeedOptions::try_from(query)?;

    let result = state.feeds.get_feed(feed_type, options).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRequest {
    pub content_id: i64,
    pub kind: EngagementKind,
}

/// Handler for engagement events
pub async fn record_engagement(
    State(state): State<AppState>,
    Json(request): Json<EngagementRequest>,
) -> AppResult<StatusCode> {
    state
        .feeds
        .record_engagement(request.content_id, request.kind)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_maps_to_options() {
        let query = FeedQuery {
            user_id: Some(7),
            lat: Some(-33.9),
            lng: Some(18.4),
            exclude: Some("3, 1,,2".to_string()),
            property_types: Some("House,APARTMENT".to_string()),
            min_price: Some(3_000_000.0),
            max_price: Some(1_000_000.0),
            areas: Some("Sea Point, Green Point".to_string()),
            offset: Some(10),
            ..Default::default()
        };

        let options = FeedOptions::try_from(query).unwrap();

        assert_eq!(options.user_id, Some(7));
        assert_eq!(options.coordinates, Some(GeoPoint::new(-33.9, 18.4)));
        assert_eq!(options.session_history, BTreeSet::from([1, 2, 3]));
        assert_eq!(
            options.filters.property_types,
            BTreeSet::from(["apartment".to_string(), "house".to_string()])
        );
        let range = options.filters.price_range.unwrap();
        assert_eq!((range.min, range.max), (1_000_000.0, 3_000_000.0));
        assert!(options.filters.locations.contains("Green Point"));
        assert_eq!(options.offset, 10);
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_invalid_query_values_are_rejected() {
        let bad_exclude = FeedQuery {
            exclude: Some("1,abc".to_string()),
            ..Default::default()
        };
        let half_coordinates = FeedQuery {
            lat: Some(10.0),
            ..Default::default()
        };
        let off_globe = FeedQuery {
            lat: Some(91.0),
            lng: Some(0.0),
            ..Default::default()
        };
        let half_price = FeedQuery {
            max_price: Some(5.0),
            ..Default::default()
        };

        for query in [bad_exclude, half_coordinates, off_globe, half_price] {
            assert!(matches!(
                FeedOptions::try_from(query),
                Err(AppError::Validation(_))
            ));
        }
    }
}
