//! Core data model definitions shared across Waypost crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod actor;
pub mod error;
pub mod ids;
pub mod route;
pub mod signal;
pub mod status;
pub mod trip;

// Intentionally curated re-exports for downstream consumers.
pub use actor::{Actor, Role};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{CarrierId, OperatorId, RiderId, StopId, TripId};
pub use route::{Carrier, GeoPoint, Rider, Stop};
pub use signal::{
    AbsenceSignal, RiderSignals, SignalKey, SignalKind, StopTally, TripSignals,
    WaitSignal,
};
pub use status::{DerivedStopStatus, StopColor};
pub use trip::{Arrival, PositionFix, TransitionError, Trip, TripPhase};
