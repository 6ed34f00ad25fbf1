//! Digest handlers

use axum::{
    extract::{Path, State},
    Json,
};
use digest_common::{errors::Result, models::Digest};
use std::sync::Arc;

use crate::AppState;

pub async fn get_digest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Arc<Digest>>> {
    let digest = state.cache.digest(id).await?;
    Ok(Json(digest))
}

/// Most recent READY digest held by the snapshot; 404 when there is none
pub async fn latest_digest(State(state): State<AppState>) -> Result<Json<Arc<Digest>>> {
    let digest = state.cache.latest_digest()?;
    Ok(Json(digest))
}
