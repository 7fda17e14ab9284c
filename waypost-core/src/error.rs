use serde::Serialize;
use thiserror::Error;
use waypost_model::{CarrierId, RiderId, TransitionError, TripId};

/// Failures reported by the trip, signal and route stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transient infrastructure failure; the write may or may not have landed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness rule held by the store rejected the write.
    #[error("conflicting write: {0}")]
    Conflict(String),

    /// Stored data could not be mapped back into the model.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. } => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The specific precondition a wait request failed, so clients can tell
/// "the carrier isn't at your stop yet" from "the window has closed".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ineligibility {
    #[error("the trip has ended")]
    TripEnded,

    #[error("requested stop is not the rider's assigned stop")]
    NotAssignedStop,

    #[error("the carrier is at a different stop")]
    NotCurrentStop,

    #[error("the carrier is between stops")]
    InTransit,

    #[error("the wait window closed after {limit_secs}s ({elapsed_secs}s elapsed)")]
    WindowClosed { elapsed_secs: i64, limit_secs: i64 },
}

impl Ineligibility {
    pub fn code(&self) -> &'static str {
        match self {
            Ineligibility::TripEnded => "trip_ended",
            Ineligibility::NotAssignedStop => "not_assigned_stop",
            Ineligibility::NotCurrentStop => "not_current_stop",
            Ineligibility::InTransit => "in_transit",
            Ineligibility::WindowClosed { .. } => "window_closed",
        }
    }
}

/// Errors surfaced by the trip coordinator. Everything except
/// [`CoordinatorError::StoreUnavailable`] is terminal for the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("carrier {carrier_id} already has an active trip")]
    AlreadyActive {
        carrier_id: CarrierId,
        active_trip: Option<TripId>,
    },

    #[error("trip {0} has ended")]
    TripEnded(TripId),

    #[error("trip {0} is not at a stop")]
    NotAtStop(TripId),

    #[error("rider {rider_id} is already marked absent for trip {trip_id}")]
    AlreadyAbsent { trip_id: TripId, rider_id: RiderId },

    #[error("not eligible: {0}")]
    NotEligible(Ineligibility),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinatorError::StoreUnavailable(_))
    }

    /// Stable machine-readable identifier for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::AlreadyActive { .. } => "already_active",
            CoordinatorError::TripEnded(_) => "trip_ended",
            CoordinatorError::NotAtStop(_) => "not_at_stop",
            CoordinatorError::AlreadyAbsent { .. } => "already_absent",
            CoordinatorError::NotEligible(_) => "not_eligible",
            CoordinatorError::Unauthorized(_) => "unauthorized",
            CoordinatorError::NotFound { .. } => "not_found",
            CoordinatorError::StoreUnavailable(_) => "store_unavailable",
            CoordinatorError::Internal(_) => "internal",
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CoordinatorError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn from_transition(trip_id: TripId, err: TransitionError) -> Self {
        match err {
            TransitionError::Ended => CoordinatorError::TripEnded(trip_id),
            TransitionError::NotAtStop => CoordinatorError::NotAtStop(trip_id),
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoordinatorError::StoreUnavailable(msg),
            StoreError::Conflict(msg) | StoreError::Corrupt(msg) => {
                CoordinatorError::Internal(msg)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
