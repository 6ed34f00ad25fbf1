//! Timeline handlers

use axum::{
    extract::{Path, State},
    Json,
};
use digest_common::{errors::Result, models::Timeline};
use std::sync::Arc;

use crate::AppState;

pub async fn get_timeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Arc<Timeline>>> {
    let timeline = state.cache.timeline(id).await?;
    Ok(Json(timeline))
}
