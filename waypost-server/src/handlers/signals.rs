use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use waypost_core::MarkedAbsence;
use waypost_core::api::{ApiResponse, SignalRequest};
use waypost_model::{TripId, WaitSignal};

use crate::infra::{app_state::AppState, errors::AppResult, identity::CurrentActor};

pub async fn request_wait(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
    Json(request): Json<SignalRequest>,
) -> AppResult<Json<ApiResponse<WaitSignal>>> {
    let signal = state
        .coordinator()
        .request_wait(&actor, trip_id, request.rider_id, request.stop_id)
        .await?;
    Ok(Json(ApiResponse::success(signal)))
}

/// `201` the first time, `200` when the rider was already marked absent.
pub async fn mark_absent(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
    Json(request): Json<SignalRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<MarkedAbsence>>)> {
    let marked = state
        .coordinator()
        .mark_absent(&actor, trip_id, request.rider_id, request.stop_id)
        .await?;

    if marked.newly_marked {
        Ok((StatusCode::CREATED, Json(ApiResponse::success(marked))))
    } else {
        Ok((
            StatusCode::OK,
            Json(ApiResponse::success(marked).with_message("rider was already marked absent")),
        ))
    }
}
