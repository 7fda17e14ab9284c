use axum::{
    Router,
    routing::{get, post},
};
use waypost_core::api::routes::v1;

use crate::handlers::{carriers, live, signals, stops, trips};
use crate::infra::app_state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        // Trip lifecycle
        .route(v1::trips::COLLECTION, post(trips::start_trip))
        .route(v1::trips::ITEM, get(trips::get_trip))
        .route(v1::trips::POSITION, post(trips::update_position))
        .route(v1::trips::ARRIVE, post(trips::arrive))
        .route(v1::trips::DEPART, post(trips::depart))
        .route(v1::trips::END, post(trips::end))
        // Rider signals
        .route(v1::signals::WAIT, post(signals::request_wait))
        .route(v1::signals::ABSENT, post(signals::mark_absent))
        // Derived statuses
        .route(v1::trips::STOPS, get(stops::list_statuses))
        .route(v1::trips::STOP, get(stops::get_status))
        .route(v1::trips::LIVE, get(live::live_handler))
        .route(v1::carriers::ACTIVE_TRIP, get(carriers::active_trip))
}
