use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, models::FeedType};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateQuery {
    pub prefix: Option<String>,
    pub feed_type: Option<FeedType>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub removed: u64,
}

/// Handler for cache-busting. Without parameters every cached feed is dropped.
pub async fn invalidate(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> AppResult<Json<InvalidateResponse>> {
    let removed = match (query.prefix, query.feed_type) {
        (Some(prefix), _) => state.feeds.invalidate_prefix(&prefix).await?,
        (None, feed_type) => state.feeds.invalidate_cache(feed_type).await,
    };

    tracing::info!(removed, "Feed cache invalidated");
    Ok(Json(InvalidateResponse { removed }))
}
