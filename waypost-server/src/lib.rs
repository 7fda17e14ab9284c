//! # Waypost Server
//!
//! HTTP and WebSocket front end for the trip coordination engine.
//!
//! Operators drive trips through `POST /api/v1/trips/...`, riders send wait
//! and absence signals, and both watch derived stop colors either by
//! polling `GET /api/v1/trips/{id}/stops` or over the live WebSocket at
//! `GET /api/v1/trips/{id}/live`. Caller identity comes from the
//! `x-actor-id` and `x-actor-role` headers set by the gateway in front of
//! the server.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
