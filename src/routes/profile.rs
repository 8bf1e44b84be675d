use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::UserProfile};

use super::AppState;

/// Handler for a user's resolved preference profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.feeds.profiles().get_user_profile(user_id).await?;
    Ok(Json(profile))
}
