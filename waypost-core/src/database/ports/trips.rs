use async_trait::async_trait;
use tokio::sync::broadcast;
use waypost_model::{CarrierId, PositionFix, Trip, TripId};

use crate::error::StoreResult;

/// What happened to a trip row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripChangeKind {
    Started,
    /// Phase, current stop or arrival time changed.
    StateChanged,
    PositionChanged,
    Ended,
}

impl TripChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripChangeKind::Started => "started",
            TripChangeKind::StateChanged => "state",
            TripChangeKind::PositionChanged => "position",
            TripChangeKind::Ended => "ended",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "started" => Some(TripChangeKind::Started),
            "state" => Some(TripChangeKind::StateChanged),
            "position" => Some(TripChangeKind::PositionChanged),
            "ended" => Some(TripChangeKind::Ended),
            _ => None,
        }
    }
}

/// Change notification emitted after a trip write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripChange {
    pub trip_id: TripId,
    pub carrier_id: CarrierId,
    pub kind: TripChangeKind,
}

/// Durable trip state.
///
/// Implementations enforce two rules on their own, without help from the
/// caller: a carrier has at most one trip with `ended_at` unset, and a trip
/// that has ended never accepts another state or position write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Persist a freshly started trip. Fails with `StoreError::Conflict`
    /// when the carrier already has an active trip.
    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()>;

    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>>;

    async fn active_trip(&self, carrier: CarrierId) -> StoreResult<Option<Trip>>;

    /// Write phase, current stop, arrival time and end time. Returns `false`
    /// without writing when the stored trip has already ended.
    async fn save_state(&self, trip: &Trip) -> StoreResult<bool>;

    /// Overwrite the last known position only. Returns `false` when the trip
    /// has ended or does not exist.
    async fn save_position(&self, id: TripId, fix: &PositionFix) -> StoreResult<bool>;

    fn subscribe(&self) -> broadcast::Receiver<TripChange>;
}
