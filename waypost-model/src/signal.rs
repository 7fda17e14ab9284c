use chrono::{DateTime, Utc};

use crate::ids::{RiderId, StopId, TripId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key shared by both rider facts; concurrent writers on different keys
/// never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalKey {
    pub trip_id: TripId,
    pub rider_id: RiderId,
}

impl SignalKey {
    pub fn new(trip_id: TripId, rider_id: RiderId) -> Self {
        Self { trip_id, rider_id }
    }
}

/// "This rider asked for extra time." At most one per (trip, rider).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WaitSignal {
    pub trip_id: TripId,
    pub rider_id: RiderId,
    pub stop_id: StopId,
    pub signaled_at: DateTime<Utc>,
}

impl WaitSignal {
    pub fn key(&self) -> SignalKey {
        SignalKey::new(self.trip_id, self.rider_id)
    }
}

/// "This rider will not board." Permanent for the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AbsenceSignal {
    pub trip_id: TripId,
    pub rider_id: RiderId,
    pub stop_id: StopId,
    pub marked_at: DateTime<Utc>,
}

impl AbsenceSignal {
    pub fn key(&self) -> SignalKey {
        SignalKey::new(self.trip_id, self.rider_id)
    }
}

/// Which of the two facts changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SignalKind {
    Wait,
    Absence,
}

/// Both facts held by one rider in one trip. The store guarantees that
/// `wait` and `absence` are never both set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiderSignals {
    pub wait: Option<WaitSignal>,
    pub absence: Option<AbsenceSignal>,
}

impl RiderSignals {
    pub fn is_absent(&self) -> bool {
        self.absence.is_some()
    }
}

/// Per-stop fact counts feeding the derivation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StopTally {
    pub wait_count: u32,
    pub absent_count: u32,
}

/// Every rider fact recorded for a trip
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TripSignals {
    pub waits: Vec<WaitSignal>,
    pub absences: Vec<AbsenceSignal>,
}

impl TripSignals {
    pub fn tally(&self, stop: StopId) -> StopTally {
        StopTally {
            wait_count: self
                .waits
                .iter()
                .filter(|signal| signal.stop_id == stop)
                .count() as u32,
            absent_count: self
                .absences
                .iter()
                .filter(|signal| signal.stop_id == stop)
                .count() as u32,
        }
    }
}
