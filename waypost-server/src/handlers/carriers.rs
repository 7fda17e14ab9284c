use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use waypost_core::api::ApiResponse;
use waypost_model::{CarrierId, Trip};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
    identity::CurrentActor,
};

/// The carrier's running trip. `404` tells clients the trip has not
/// started yet.
pub async fn active_trip(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(carrier_id): Path<CarrierId>,
) -> AppResult<Json<ApiResponse<Trip>>> {
    let trip = state
        .coordinator()
        .active_trip(&actor, carrier_id)
        .await?
        .ok_or_else(|| {
            AppError::new(
                StatusCode::NOT_FOUND,
                "no_active_trip",
                format!("carrier {carrier_id} has no trip in progress"),
            )
        })?;
    Ok(Json(ApiResponse::success(trip)))
}
