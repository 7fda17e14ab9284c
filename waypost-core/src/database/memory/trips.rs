use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tracing::trace;
use waypost_model::{CarrierId, PositionFix, Trip, TripId};

use super::CHANGE_CHANNEL_CAPACITY;
use crate::database::ports::{TripChange, TripChangeKind, TripStore};
use crate::error::{StoreError, StoreResult};

pub struct InMemoryTripStore {
    trips: DashMap<TripId, Trip>,
    active: DashMap<CarrierId, TripId>,
    changes: broadcast::Sender<TripChange>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            trips: DashMap::new(),
            active: DashMap::new(),
            changes,
        }
    }

    fn publish(&self, trip: &Trip, kind: TripChangeKind) {
        let change = TripChange {
            trip_id: trip.id,
            carrier_id: trip.carrier_id,
            kind,
        };
        if self.changes.send(change).is_err() {
            trace!(trip_id = %trip.id, "no trip change subscribers");
        }
    }
}

impl Default for InMemoryTripStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryTripStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTripStore")
            .field("trips", &self.trips.len())
            .field("active", &self.active.len())
            .field("subscribers", &self.changes.receiver_count())
            .finish()
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        // The active slot stays locked until the trip row is visible, so two
        // concurrent starts for one carrier serialize here.
        match self.active.entry(trip.carrier_id) {
            Entry::Occupied(mut slot) => {
                let still_active = self
                    .trips
                    .get(slot.get())
                    .is_some_and(|existing| !existing.is_ended());
                if still_active {
                    return Err(StoreError::Conflict(format!(
                        "carrier {} already has active trip {}",
                        trip.carrier_id,
                        slot.get()
                    )));
                }
                self.trips.insert(trip.id, trip.clone());
                slot.insert(trip.id);
            }
            Entry::Vacant(slot) => {
                self.trips.insert(trip.id, trip.clone());
                slot.insert(trip.id);
            }
        }

        self.publish(trip, TripChangeKind::Started);
        Ok(())
    }

    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        Ok(self.trips.get(&id).map(|trip| trip.clone()))
    }

    async fn active_trip(&self, carrier: CarrierId) -> StoreResult<Option<Trip>> {
        let Some(trip_id) = self.active.get(&carrier).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self
            .trips
            .get(&trip_id)
            .filter(|trip| !trip.is_ended())
            .map(|trip| trip.clone()))
    }

    async fn save_state(&self, trip: &Trip) -> StoreResult<bool> {
        let ended = {
            let Some(mut stored) = self.trips.get_mut(&trip.id) else {
                return Ok(false);
            };
            if stored.is_ended() {
                return Ok(false);
            }
            stored.phase = trip.phase;
            stored.current_stop = trip.current_stop;
            stored.arrived_at = trip.arrived_at;
            stored.ended_at = trip.ended_at;
            stored.is_ended()
        };

        if ended {
            self.active
                .remove_if(&trip.carrier_id, |_, active| *active == trip.id);
            self.publish(trip, TripChangeKind::Ended);
        } else {
            self.publish(trip, TripChangeKind::StateChanged);
        }
        Ok(true)
    }

    async fn save_position(&self, id: TripId, fix: &PositionFix) -> StoreResult<bool> {
        let updated = {
            let Some(mut stored) = self.trips.get_mut(&id) else {
                return Ok(false);
            };
            if !stored.record_position(*fix) {
                return Ok(false);
            }
            stored.clone()
        };

        self.publish(&updated, TripChangeKind::PositionChanged);
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<TripChange> {
        self.changes.subscribe()
    }
}
