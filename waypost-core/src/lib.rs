//! Trip coordination engine.
//!
//! A carrier runs trips along a fixed list of stops. While a trip runs,
//! riders tell the operator to wait for them or that they will not board,
//! and the operator sees a live color per stop derived from those facts
//! and the time spent at the stop.
//!
//! * [`coordinator::TripCoordinator`] validates and applies every lifecycle
//!   transition and rider signal.
//! * [`derivation`] holds the pure color function.
//! * [`live::LivePublisher`] pushes derived statuses to subscribers.
//! * [`database`] defines the store ports with in-memory and PostgreSQL
//!   adapters.

#![allow(missing_docs)]

pub mod api;
pub mod board;
pub mod clock;
pub mod coordinator;
pub mod database;
pub mod derivation;
pub mod error;
pub mod live;
pub mod retry;

pub use waypost_model as model;

pub use board::{TripBoard, ViewScope};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{MarkedAbsence, TripCoordinator, TripSnapshot};
pub use database::TripStores;
pub use derivation::{WaitWindows, derive_status, derive_stop_status};
pub use error::{CoordinatorError, Ineligibility, Result, StoreError, StoreResult};
pub use live::{LiveConfig, LivePublisher, LiveSubscription, LiveUpdate};
pub use retry::RetryPolicy;
