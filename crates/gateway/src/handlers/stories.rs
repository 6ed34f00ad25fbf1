//! Story handlers

use axum::{
    extract::{Path, State},
    Json,
};
use digest_common::{errors::Result, models::Story};
use std::sync::Arc;

use crate::AppState;

/// Ranked stories of the latest digest
pub async fn list_stories(State(state): State<AppState>) -> Json<Arc<[Arc<Story>]>> {
    Json(state.cache.stories())
}

/// Single story, fetched from the store on a cache miss
pub async fn get_story(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Arc<Story>>> {
    let story = state.cache.story(id).await?;
    Ok(Json(story))
}
