use axum::{
    Json,
    extract::{Path, State},
};
use waypost_core::TripSnapshot;
use waypost_core::api::ApiResponse;
use waypost_model::{DerivedStopStatus, StopId, TripId};

use crate::infra::{app_state::AppState, errors::AppResult, identity::CurrentActor};

/// Derived statuses of every stop the caller may see.
pub async fn list_statuses(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
) -> AppResult<Json<ApiResponse<TripSnapshot>>> {
    let snapshot = state.coordinator().stop_statuses(&actor, trip_id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

pub async fn get_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((trip_id, stop_id)): Path<(TripId, StopId)>,
) -> AppResult<Json<ApiResponse<DerivedStopStatus>>> {
    let status = state
        .coordinator()
        .stop_status(&actor, trip_id, stop_id)
        .await?;
    Ok(Json(ApiResponse::success(status)))
}
