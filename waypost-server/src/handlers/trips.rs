use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use waypost_core::api::{
    ApiResponse, ArriveRequest, PositionAccepted, PositionRequest, StartTripRequest,
};
use waypost_model::{Trip, TripId};

use crate::infra::{app_state::AppState, errors::AppResult, identity::CurrentActor};

pub async fn start_trip(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(request): Json<StartTripRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Trip>>)> {
    let position = request.position.map(PositionRequest::to_point).transpose()?;
    let trip = state
        .coordinator()
        .start_trip(&actor, request.carrier_id, position)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(trip))))
}

pub async fn get_trip(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
) -> AppResult<Json<ApiResponse<Trip>>> {
    let trip = state.coordinator().trip(&actor, trip_id).await?;
    Ok(Json(ApiResponse::success(trip)))
}

pub async fn update_position(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
    Json(request): Json<PositionRequest>,
) -> AppResult<Json<ApiResponse<PositionAccepted>>> {
    let accepted = state
        .coordinator()
        .update_position(&actor, trip_id, request.to_point()?)
        .await?;
    Ok(Json(ApiResponse::success(PositionAccepted { accepted })))
}

pub async fn arrive(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
    Json(request): Json<ArriveRequest>,
) -> AppResult<Json<ApiResponse<Trip>>> {
    let trip = state
        .coordinator()
        .arrive_at_stop(&actor, trip_id, request.stop_id)
        .await?;
    Ok(Json(ApiResponse::success(trip)))
}

pub async fn depart(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
) -> AppResult<Json<ApiResponse<Trip>>> {
    let trip = state.coordinator().depart_stop(&actor, trip_id).await?;
    Ok(Json(ApiResponse::success(trip)))
}

pub async fn end(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
) -> AppResult<Json<ApiResponse<Trip>>> {
    let trip = state.coordinator().end_trip(&actor, trip_id).await?;
    Ok(Json(ApiResponse::success(trip)))
}
