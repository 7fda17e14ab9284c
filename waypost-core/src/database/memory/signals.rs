use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;
use waypost_model::{
    AbsenceSignal, RiderSignals, SignalKey, SignalKind, TripId, TripSignals,
    WaitSignal,
};

use super::CHANGE_CHANNEL_CAPACITY;
use crate::database::ports::{AbsenceWrite, SignalChange, SignalStore, WaitWrite};
use crate::error::StoreResult;

/// One row per (trip, rider); the shard lock held by `entry` makes each
/// conditional write atomic for its key.
pub struct InMemorySignalStore {
    rows: DashMap<SignalKey, RiderSignals>,
    changes: broadcast::Sender<SignalChange>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            rows: DashMap::new(),
            changes,
        }
    }

    fn publish(&self, change: SignalChange) {
        if self.changes.send(change).is_err() {
            trace!(trip_id = %change.trip_id, "no signal change subscribers");
        }
    }
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemorySignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySignalStore")
            .field("rows", &self.rows.len())
            .field("subscribers", &self.changes.receiver_count())
            .finish()
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn upsert_wait(&self, signal: &WaitSignal) -> StoreResult<WaitWrite> {
        {
            let mut row = self.rows.entry(signal.key()).or_default();
            if let Some(absence) = row.absence {
                return Ok(WaitWrite::Blocked(absence));
            }
            row.wait = Some(*signal);
        }

        self.publish(SignalChange {
            trip_id: signal.trip_id,
            rider_id: signal.rider_id,
            stop_id: signal.stop_id,
            kind: SignalKind::Wait,
        });
        Ok(WaitWrite::Stored(*signal))
    }

    async fn record_absence(&self, signal: &AbsenceSignal) -> StoreResult<AbsenceWrite> {
        {
            let mut row = self.rows.entry(signal.key()).or_default();
            if let Some(existing) = row.absence {
                return Ok(AbsenceWrite::Existing(existing));
            }
            row.absence = Some(*signal);
            row.wait = None;
        }

        self.publish(SignalChange {
            trip_id: signal.trip_id,
            rider_id: signal.rider_id,
            stop_id: signal.stop_id,
            kind: SignalKind::Absence,
        });
        Ok(AbsenceWrite::Created(*signal))
    }

    async fn rider_signals(&self, key: SignalKey) -> StoreResult<RiderSignals> {
        Ok(self.rows.get(&key).map(|row| *row).unwrap_or_default())
    }

    async fn trip_signals(&self, trip: TripId) -> StoreResult<TripSignals> {
        let mut signals = TripSignals::default();
        for row in self.rows.iter().filter(|row| row.key().trip_id == trip) {
            signals.waits.extend(row.wait);
            signals.absences.extend(row.absence);
        }
        Ok(signals)
    }

    fn subscribe(&self) -> broadcast::Receiver<SignalChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use waypost_model::{RiderId, StopId};

    fn wait(trip: TripId, rider: RiderId, stop: StopId) -> WaitSignal {
        WaitSignal {
            trip_id: trip,
            rider_id: rider,
            stop_id: stop,
            signaled_at: Utc::now(),
        }
    }

    fn absence(trip: TripId, rider: RiderId, stop: StopId) -> AbsenceSignal {
        AbsenceSignal {
            trip_id: trip,
            rider_id: rider,
            stop_id: stop,
            marked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn wait_upsert_refreshes_instead_of_accumulating() {
        let store = InMemorySignalStore::new();
        let (trip, rider, stop) = (TripId::new(), RiderId::new(), StopId::new());

        let first = wait(trip, rider, stop);
        store.upsert_wait(&first).await.unwrap();
        let mut second = first;
        second.signaled_at = first.signaled_at + Duration::seconds(30);
        store.upsert_wait(&second).await.unwrap();

        let signals = store.trip_signals(trip).await.unwrap();
        assert_eq!(signals.waits, vec![second]);
    }

    #[tokio::test]
    async fn absence_deletes_wait_and_blocks_new_ones() {
        let store = InMemorySignalStore::new();
        let (trip, rider, stop) = (TripId::new(), RiderId::new(), StopId::new());

        store.upsert_wait(&wait(trip, rider, stop)).await.unwrap();
        let marked = absence(trip, rider, stop);
        assert_eq!(
            store.record_absence(&marked).await.unwrap(),
            AbsenceWrite::Created(marked)
        );

        let row = store.rider_signals(SignalKey::new(trip, rider)).await.unwrap();
        assert!(row.wait.is_none());
        assert_eq!(row.absence, Some(marked));

        assert_eq!(
            store.upsert_wait(&wait(trip, rider, stop)).await.unwrap(),
            WaitWrite::Blocked(marked)
        );
        let again = absence(trip, rider, stop);
        assert_eq!(
            store.record_absence(&again).await.unwrap(),
            AbsenceWrite::Existing(marked)
        );
    }

    #[tokio::test]
    async fn racing_wait_and_absence_never_coexist() {
        for _ in 0..64 {
            let store = Arc::new(InMemorySignalStore::new());
            let (trip, rider, stop) = (TripId::new(), RiderId::new(), StopId::new());

            let waiter = {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.upsert_wait(&wait(trip, rider, stop)).await })
            };
            let marker = {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.record_absence(&absence(trip, rider, stop)).await
                })
            };
            waiter.await.unwrap().unwrap();
            marker.await.unwrap().unwrap();

            let row = store.rider_signals(SignalKey::new(trip, rider)).await.unwrap();
            assert!(row.absence.is_some());
            assert!(row.wait.is_none());
        }
    }

    #[tokio::test]
    async fn stop_query_filters_by_stop() {
        let store = InMemorySignalStore::new();
        let trip = TripId::new();
        let (here, there) = (StopId::new(), StopId::new());

        store.upsert_wait(&wait(trip, RiderId::new(), here)).await.unwrap();
        store.upsert_wait(&wait(trip, RiderId::new(), there)).await.unwrap();
        store.record_absence(&absence(trip, RiderId::new(), here)).await.unwrap();
        store
            .upsert_wait(&wait(TripId::new(), RiderId::new(), here))
            .await
            .unwrap();

        let signals = store.stop_signals(trip, here).await.unwrap();
        assert_eq!(signals.waits.len(), 1);
        assert_eq!(signals.absences.len(), 1);
        assert_eq!(store.trip_signals(trip).await.unwrap().tally(there).wait_count, 1);
    }
}
