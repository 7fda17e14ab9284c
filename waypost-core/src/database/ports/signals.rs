use async_trait::async_trait;
use tokio::sync::broadcast;
use waypost_model::{
    AbsenceSignal, RiderId, RiderSignals, SignalKey, SignalKind, StopId, TripId,
    TripSignals, WaitSignal,
};

use crate::error::StoreResult;

/// Change notification emitted after a rider fact is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalChange {
    pub trip_id: TripId,
    pub rider_id: RiderId,
    pub stop_id: StopId,
    pub kind: SignalKind,
}

/// Outcome of a wait upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitWrite {
    Stored(WaitSignal),
    /// The rider is already absent; nothing was written.
    Blocked(AbsenceSignal),
}

/// Outcome of recording an absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceWrite {
    Created(AbsenceSignal),
    /// An absence was already on record; it is returned unchanged.
    Existing(AbsenceSignal),
}

impl AbsenceWrite {
    pub fn signal(&self) -> AbsenceSignal {
        match self {
            AbsenceWrite::Created(signal) | AbsenceWrite::Existing(signal) => *signal,
        }
    }
}

/// Atomic rider facts keyed by (trip, rider).
///
/// Both writes are conditional on the current row for their key and must be
/// applied atomically per key: a wait is only stored while no absence
/// exists, and an absence removes any wait in the same step. Writes to
/// different keys never contend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn upsert_wait(&self, signal: &WaitSignal) -> StoreResult<WaitWrite>;

    async fn record_absence(&self, signal: &AbsenceSignal) -> StoreResult<AbsenceWrite>;

    async fn rider_signals(&self, key: SignalKey) -> StoreResult<RiderSignals>;

    async fn trip_signals(&self, trip: TripId) -> StoreResult<TripSignals>;

    async fn stop_signals(&self, trip: TripId, stop: StopId) -> StoreResult<TripSignals> {
        let mut signals = self.trip_signals(trip).await?;
        signals.waits.retain(|wait| wait.stop_id == stop);
        signals.absences.retain(|absence| absence.stop_id == stop);
        Ok(signals)
    }

    fn subscribe(&self) -> broadcast::Receiver<SignalChange>;
}
