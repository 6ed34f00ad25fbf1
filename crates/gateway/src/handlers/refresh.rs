//! Explicit refresh handler

use axum::{extract::State, Json};
use digest_common::{cache::RefreshOutcome, errors::Result, RefreshTrigger};
use serde::Serialize;
use tracing::info;

use crate::AppState;

#[derive(Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: RefreshOutcome,
}

/// Rebuild the snapshot now and restart the refresh schedule
pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>> {
    info!("Explicit refresh requested");

    let outcome = state.cache.rebuild(RefreshTrigger::Explicit).await?;
    state.refresh.reset_phase();

    Ok(Json(RefreshResponse {
        status: "refreshed",
        outcome,
    }))
}
