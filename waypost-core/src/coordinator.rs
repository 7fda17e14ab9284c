//! Trip coordinator: the single entry point for every lifecycle transition
//! and rider signal.
//!
//! Each operation checks the caller's capability, reads what it needs,
//! validates the transition and then performs exactly one keyed write. The
//! value it returns reflects that write.

use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use waypost_model::{
    AbsenceSignal, Actor, Arrival, CarrierId, DerivedStopStatus, GeoPoint,
    OperatorId, PositionFix, Rider, RiderId, SignalKey, StopId, Trip, TripId,
    WaitSignal,
};

use crate::board::{TripBoard, ViewScope};
use crate::clock::Clock;
use crate::database::TripStores;
use crate::database::ports::{AbsenceWrite, WaitWrite};
use crate::derivation::WaitWindows;
use crate::error::{CoordinatorError, Ineligibility, Result, StoreError};

/// Result of a `mark_absent` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkedAbsence {
    pub signal: AbsenceSignal,
    /// False when the rider had already been marked absent; the stored
    /// fact is returned unchanged.
    pub newly_marked: bool,
}

/// Point-in-time view of a trip restricted to what the caller may see.
#[derive(Debug, Clone, Serialize)]
pub struct TripSnapshot {
    pub trip: Trip,
    pub scope: ViewScope,
    pub statuses: Vec<DerivedStopStatus>,
}

#[derive(Clone)]
pub struct TripCoordinator {
    stores: TripStores,
    clock: Arc<dyn Clock>,
    windows: WaitWindows,
}

impl fmt::Debug for TripCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripCoordinator")
            .field("stores", &self.stores)
            .field("clock", &type_name_of_val(self.clock.as_ref()))
            .field("windows", &self.windows)
            .finish()
    }
}

impl TripCoordinator {
    pub fn new(stores: TripStores, clock: Arc<dyn Clock>) -> Self {
        Self {
            stores,
            clock,
            windows: WaitWindows::default(),
        }
    }

    pub fn with_windows(mut self, windows: WaitWindows) -> Self {
        self.windows = windows;
        self
    }

    pub fn stores(&self) -> &TripStores {
        &self.stores
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn windows(&self) -> &WaitWindows {
        &self.windows
    }

    #[instrument(skip(self, initial_position), fields(actor = %actor.id))]
    pub async fn start_trip(
        &self,
        actor: &Actor,
        carrier_id: CarrierId,
        initial_position: Option<GeoPoint>,
    ) -> Result<Trip> {
        let operator = require_operator(actor)?;

        self.stores
            .routes
            .carrier(carrier_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("carrier", carrier_id))?;

        if let Some(active) = self.stores.trips.active_trip(carrier_id).await? {
            return Err(CoordinatorError::AlreadyActive {
                carrier_id,
                active_trip: Some(active.id),
            });
        }

        let trip = Trip::start(carrier_id, operator, initial_position, self.clock.now());
        match self.stores.trips.insert_trip(&trip).await {
            Ok(()) => {
                info!(trip_id = %trip.id, carrier_id = %carrier_id, "trip started");
                Ok(trip)
            }
            Err(StoreError::Conflict(_)) => {
                let active_trip = self
                    .stores
                    .trips
                    .active_trip(carrier_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|trip| trip.id);
                Err(CoordinatorError::AlreadyActive {
                    carrier_id,
                    active_trip,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Record the carrier's latest position. Returns `false` without
    /// writing when the trip has already ended.
    #[instrument(skip(self, position), fields(actor = %actor.id))]
    pub async fn update_position(
        &self,
        actor: &Actor,
        trip_id: TripId,
        position: GeoPoint,
    ) -> Result<bool> {
        let trip = self.load_trip(trip_id).await?;
        require_trip_operator(actor, &trip)?;

        if trip.is_ended() {
            debug!(trip_id = %trip_id, "ignoring position for ended trip");
            return Ok(false);
        }

        let fix = PositionFix {
            position,
            reported_at: self.clock.now(),
        };
        Ok(self.stores.trips.save_position(trip_id, &fix).await?)
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn arrive_at_stop(
        &self,
        actor: &Actor,
        trip_id: TripId,
        stop_id: StopId,
    ) -> Result<Trip> {
        let mut trip = self.load_trip(trip_id).await?;
        require_trip_operator(actor, &trip)?;
        if trip.is_ended() {
            return Err(CoordinatorError::TripEnded(trip_id));
        }

        let carrier = self
            .stores
            .routes
            .carrier(trip.carrier_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("carrier", trip.carrier_id))?;
        if !carrier.has_stop(stop_id) {
            return Err(CoordinatorError::not_found("stop", stop_id));
        }

        let arrival = trip
            .arrive(stop_id, self.clock.now())
            .map_err(|err| CoordinatorError::from_transition(trip_id, err))?;
        if arrival == Arrival::AlreadyThere {
            debug!(trip_id = %trip_id, stop_id = %stop_id, "already at stop, timer kept");
            return Ok(trip);
        }

        self.save_state(&trip).await?;
        info!(trip_id = %trip_id, stop_id = %stop_id, "arrived at stop");
        Ok(trip)
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn depart_stop(&self, actor: &Actor, trip_id: TripId) -> Result<Trip> {
        let mut trip = self.load_trip(trip_id).await?;
        require_trip_operator(actor, &trip)?;

        trip.depart()
            .map_err(|err| CoordinatorError::from_transition(trip_id, err))?;
        self.save_state(&trip).await?;
        info!(trip_id = %trip_id, stop_id = ?trip.current_stop, "departed stop");
        Ok(trip)
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn end_trip(&self, actor: &Actor, trip_id: TripId) -> Result<Trip> {
        let mut trip = self.load_trip(trip_id).await?;
        require_trip_operator(actor, &trip)?;

        trip.end(self.clock.now())
            .map_err(|err| CoordinatorError::from_transition(trip_id, err))?;
        self.save_state(&trip).await?;
        info!(trip_id = %trip_id, "trip ended");
        Ok(trip)
    }

    /// Ask the operator to hold the carrier at the rider's stop.
    ///
    /// An absence on record always wins; otherwise the request has to pass
    /// every eligibility check before the wait is upserted.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn request_wait(
        &self,
        actor: &Actor,
        trip_id: TripId,
        rider_id: RiderId,
        stop_id: StopId,
    ) -> Result<WaitSignal> {
        require_rider(actor, rider_id)?;
        let trip = self.load_trip(trip_id).await?;
        let rider = self.load_rider_for(&trip, rider_id).await?;

        let key = SignalKey::new(trip_id, rider_id);
        if self.stores.signals.rider_signals(key).await?.is_absent() {
            return Err(CoordinatorError::AlreadyAbsent { trip_id, rider_id });
        }

        let now = self.clock.now();
        self.check_wait_eligibility(&trip, &rider, stop_id, now)
            .map_err(CoordinatorError::NotEligible)?;

        let signal = WaitSignal {
            trip_id,
            rider_id,
            stop_id,
            signaled_at: now,
        };
        match self.stores.signals.upsert_wait(&signal).await? {
            WaitWrite::Stored(stored) => {
                info!(trip_id = %trip_id, rider_id = %rider_id, stop_id = %stop_id, "wait requested");
                Ok(stored)
            }
            WaitWrite::Blocked(_) => Err(CoordinatorError::AlreadyAbsent { trip_id, rider_id }),
        }
    }

    /// Record that the rider will not board. Marking twice returns the
    /// first absence with `newly_marked == false`.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn mark_absent(
        &self,
        actor: &Actor,
        trip_id: TripId,
        rider_id: RiderId,
        stop_id: StopId,
    ) -> Result<MarkedAbsence> {
        require_rider(actor, rider_id)?;
        let trip = self.load_trip(trip_id).await?;
        let rider = self.load_rider_for(&trip, rider_id).await?;

        if trip.is_ended() {
            return Err(CoordinatorError::TripEnded(trip_id));
        }
        if rider.stop_id != stop_id {
            return Err(CoordinatorError::NotEligible(Ineligibility::NotAssignedStop));
        }

        let signal = AbsenceSignal {
            trip_id,
            rider_id,
            stop_id,
            marked_at: self.clock.now(),
        };
        let write = self.stores.signals.record_absence(&signal).await?;
        let newly_marked = matches!(write, AbsenceWrite::Created(_));
        if newly_marked {
            info!(trip_id = %trip_id, rider_id = %rider_id, stop_id = %stop_id, "rider marked absent");
        }
        Ok(MarkedAbsence {
            signal: write.signal(),
            newly_marked,
        })
    }

    pub async fn trip(&self, actor: &Actor, trip_id: TripId) -> Result<Trip> {
        let (trip, _) = self.view_scope(actor, trip_id).await?;
        Ok(trip)
    }

    /// The carrier's running trip, or `None` when no trip has started.
    pub async fn active_trip(&self, actor: &Actor, carrier_id: CarrierId) -> Result<Option<Trip>> {
        if let Some(rider_id) = actor.as_rider() {
            let rider = self
                .stores
                .routes
                .rider(rider_id)
                .await?
                .ok_or_else(|| CoordinatorError::not_found("rider", rider_id))?;
            if rider.carrier_id != carrier_id {
                return Err(CoordinatorError::Unauthorized(format!(
                    "rider {rider_id} does not ride carrier {carrier_id}"
                )));
            }
        }

        Ok(self.stores.trips.active_trip(carrier_id).await?)
    }

    /// Resolve which stops `actor` may watch on this trip.
    pub async fn view_scope(&self, actor: &Actor, trip_id: TripId) -> Result<(Trip, ViewScope)> {
        let trip = self.load_trip(trip_id).await?;

        if let Some(operator) = actor.as_operator() {
            if operator != trip.operator_id {
                return Err(CoordinatorError::Unauthorized(format!(
                    "operator {operator} does not run trip {trip_id}"
                )));
            }
            return Ok((trip, ViewScope::AllStops));
        }

        if let Some(rider_id) = actor.as_rider() {
            let rider = self.load_rider_for(&trip, rider_id).await?;
            return Ok((trip, ViewScope::Stop(rider.stop_id)));
        }

        Err(CoordinatorError::Unauthorized(format!(
            "role {} cannot view trips",
            actor.role
        )))
    }

    /// Derived statuses of every stop the caller may see.
    pub async fn stop_statuses(&self, actor: &Actor, trip_id: TripId) -> Result<TripSnapshot> {
        let (_, scope) = self.view_scope(actor, trip_id).await?;
        let board = self.load_board(trip_id).await?;
        let statuses = board.statuses(&self.windows, scope, self.clock.now());
        Ok(TripSnapshot {
            trip: board.trip,
            scope,
            statuses,
        })
    }

    /// Derived status of a single stop.
    pub async fn stop_status(
        &self,
        actor: &Actor,
        trip_id: TripId,
        stop_id: StopId,
    ) -> Result<DerivedStopStatus> {
        let (_, scope) = self.view_scope(actor, trip_id).await?;
        if !scope.includes(stop_id) {
            return Err(CoordinatorError::Unauthorized(format!(
                "stop {stop_id} is outside the caller's view"
            )));
        }

        let board = self.load_board(trip_id).await?;
        board
            .status(&self.windows, stop_id, self.clock.now())
            .ok_or_else(|| CoordinatorError::not_found("stop", stop_id))
    }

    /// Load the trip, its route, rider counts and signals in one go.
    pub async fn load_board(&self, trip_id: TripId) -> Result<TripBoard> {
        let trip = self.load_trip(trip_id).await?;
        let carrier = self
            .stores
            .routes
            .carrier(trip.carrier_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("carrier", trip.carrier_id))?;
        let rider_counts = self.stores.routes.rider_counts(trip.carrier_id).await?;
        let signals = self.stores.signals.trip_signals(trip_id).await?;

        Ok(TripBoard {
            trip,
            carrier,
            rider_counts,
            signals,
        })
    }

    async fn load_trip(&self, trip_id: TripId) -> Result<Trip> {
        self.stores
            .trips
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("trip", trip_id))
    }

    async fn load_rider_for(&self, trip: &Trip, rider_id: RiderId) -> Result<Rider> {
        let rider = self
            .stores
            .routes
            .rider(rider_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("rider", rider_id))?;
        if rider.carrier_id != trip.carrier_id {
            return Err(CoordinatorError::Unauthorized(format!(
                "rider {rider_id} does not ride carrier {}",
                trip.carrier_id
            )));
        }
        Ok(rider)
    }

    async fn save_state(&self, trip: &Trip) -> Result<()> {
        if self.stores.trips.save_state(trip).await? {
            Ok(())
        } else {
            warn!(trip_id = %trip.id, "state write refused, trip ended concurrently");
            Err(CoordinatorError::TripEnded(trip.id))
        }
    }

    fn check_wait_eligibility(
        &self,
        trip: &Trip,
        rider: &Rider,
        stop_id: StopId,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), Ineligibility> {
        if trip.is_ended() {
            return Err(Ineligibility::TripEnded);
        }
        if rider.stop_id != stop_id {
            return Err(Ineligibility::NotAssignedStop);
        }
        if !trip.is_at_stop() {
            return Err(Ineligibility::InTransit);
        }
        if trip.current_stop != Some(stop_id) {
            return Err(Ineligibility::NotCurrentStop);
        }

        let elapsed = trip.elapsed_at_stop(now).unwrap_or_else(chrono::Duration::zero);
        if elapsed > self.windows.extended() {
            return Err(Ineligibility::WindowClosed {
                elapsed_secs: whole_secs_rounded_up(elapsed),
                limit_secs: self.windows.extended_secs,
            });
        }
        Ok(())
    }
}

/// A window that closed at 420 s must never report 420 s elapsed.
fn whole_secs_rounded_up(elapsed: chrono::Duration) -> i64 {
    let whole = elapsed.num_seconds();
    if elapsed > chrono::Duration::seconds(whole) {
        whole + 1
    } else {
        whole
    }
}

fn require_operator(actor: &Actor) -> Result<OperatorId> {
    actor.as_operator().ok_or_else(|| {
        CoordinatorError::Unauthorized(format!("role {} cannot operate trips", actor.role))
    })
}

fn require_trip_operator(actor: &Actor, trip: &Trip) -> Result<()> {
    let operator = require_operator(actor)?;
    if operator != trip.operator_id {
        return Err(CoordinatorError::Unauthorized(format!(
            "operator {operator} does not run trip {}",
            trip.id
        )));
    }
    Ok(())
}

fn require_rider(actor: &Actor, rider_id: RiderId) -> Result<()> {
    match actor.as_rider() {
        Some(own) if own == rider_id => Ok(()),
        Some(own) => Err(CoordinatorError::Unauthorized(format!(
            "rider {own} cannot signal for rider {rider_id}"
        ))),
        None => Err(CoordinatorError::Unauthorized(format!(
            "role {} cannot send rider signals",
            actor.role
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::memory::{InMemorySignalStore, StaticRouteDirectory};
    use crate::database::ports::{MockSignalStore, MockTripStore};
    use chrono::Duration;
    use waypost_model::{Carrier, Stop};

    struct Fixture {
        coordinator: TripCoordinator,
        clock: ManualClock,
        carrier: CarrierId,
        stops: Vec<StopId>,
        rider: RiderId,
    }

    fn route() -> (StaticRouteDirectory, CarrierId, Vec<StopId>, RiderId) {
        let carrier = Carrier {
            id: CarrierId::new(),
            name: "Route 9".into(),
            stops: (0..2)
                .map(|sequence| Stop {
                    id: StopId::new(),
                    name: format!("Stop {sequence}"),
                    position: GeoPoint {
                        latitude: 48.1,
                        longitude: 11.5,
                    },
                    sequence,
                })
                .collect(),
        };
        let carrier_id = carrier.id;
        let stops: Vec<_> = carrier.stop_ids().collect();
        let rider = RiderId::new();

        let mut routes = StaticRouteDirectory::new();
        routes.insert_carrier(carrier).unwrap();
        routes
            .assign_rider(Rider {
                id: rider,
                carrier_id,
                stop_id: stops[0],
                display_name: "Alex".into(),
            })
            .unwrap();
        (routes, carrier_id, stops, rider)
    }

    fn fixture() -> Fixture {
        let (routes, carrier, stops, rider) = route();
        let clock = ManualClock::new(Utc::now());
        let coordinator =
            TripCoordinator::new(TripStores::in_memory(routes), Arc::new(clock.clone()));
        Fixture {
            coordinator,
            clock,
            carrier,
            stops,
            rider,
        }
    }

    #[tokio::test]
    async fn riders_cannot_drive_and_operators_cannot_signal() {
        let fx = fixture();
        let rider = Actor::rider(fx.rider);
        let err = fx
            .coordinator
            .start_trip(&rider, fx.carrier, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Unauthorized(_)));

        let operator = Actor::operator(OperatorId::new());
        let trip = fx.coordinator.start_trip(&operator, fx.carrier, None).await.unwrap();
        let err = fx
            .coordinator
            .request_wait(&operator, trip.id, fx.rider, fx.stops[0])
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Unauthorized(_)));

        let other_operator = Actor::operator(OperatorId::new());
        let err = fx
            .coordinator
            .arrive_at_stop(&other_operator, trip.id, fx.stops[0])
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rider_cannot_signal_on_behalf_of_someone_else() {
        let fx = fixture();
        let operator = Actor::operator(OperatorId::new());
        let trip = fx.coordinator.start_trip(&operator, fx.carrier, None).await.unwrap();

        let impostor = Actor::rider(RiderId::new());
        let err = fx
            .coordinator
            .mark_absent(&impostor, trip.id, fx.rider, fx.stops[0])
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn arriving_at_unknown_stop_is_not_found() {
        let fx = fixture();
        let operator = Actor::operator(OperatorId::new());
        let trip = fx.coordinator.start_trip(&operator, fx.carrier, None).await.unwrap();

        let err = fx
            .coordinator
            .arrive_at_stop(&operator, trip.id, StopId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotFound { kind: "stop", .. }));
    }

    #[tokio::test]
    async fn wait_eligibility_reports_the_failed_check() {
        let fx = fixture();
        let operator = Actor::operator(OperatorId::new());
        let rider = Actor::rider(fx.rider);
        let trip = fx.coordinator.start_trip(&operator, fx.carrier, None).await.unwrap();

        let err = fx
            .coordinator
            .request_wait(&rider, trip.id, fx.rider, fx.stops[0])
            .await
            .unwrap_err();
        assert_eq!(err, CoordinatorError::NotEligible(Ineligibility::InTransit));

        fx.coordinator
            .arrive_at_stop(&operator, trip.id, fx.stops[1])
            .await
            .unwrap();
        let err = fx
            .coordinator
            .request_wait(&rider, trip.id, fx.rider, fx.stops[0])
            .await
            .unwrap_err();
        assert_eq!(err, CoordinatorError::NotEligible(Ineligibility::NotCurrentStop));

        let err = fx
            .coordinator
            .request_wait(&rider, trip.id, fx.rider, fx.stops[1])
            .await
            .unwrap_err();
        assert_eq!(err, CoordinatorError::NotEligible(Ineligibility::NotAssignedStop));

        fx.coordinator
            .arrive_at_stop(&operator, trip.id, fx.stops[0])
            .await
            .unwrap();
        fx.clock.advance(Duration::seconds(421));
        let err = fx
            .coordinator
            .request_wait(&rider, trip.id, fx.rider, fx.stops[0])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoordinatorError::NotEligible(Ineligibility::WindowClosed {
                elapsed_secs: 421,
                limit_secs: 420,
            })
        );
    }

    #[tokio::test]
    async fn closed_window_reports_elapsed_past_the_limit() {
        let fx = fixture();
        let operator = Actor::operator(OperatorId::new());
        let rider = Actor::rider(fx.rider);
        let trip = fx.coordinator.start_trip(&operator, fx.carrier, None).await.unwrap();
        fx.coordinator
            .arrive_at_stop(&operator, trip.id, fx.stops[0])
            .await
            .unwrap();

        fx.clock.advance(Duration::seconds(420));
        fx.coordinator
            .request_wait(&rider, trip.id, fx.rider, fx.stops[0])
            .await
            .unwrap();

        fx.clock.advance(Duration::milliseconds(500));
        let err = fx
            .coordinator
            .request_wait(&rider, trip.id, fx.rider, fx.stops[0])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoordinatorError::NotEligible(Ineligibility::WindowClosed {
                elapsed_secs: 421,
                limit_secs: 420,
            })
        );
    }

    #[tokio::test]
    async fn rearrival_at_same_stop_keeps_the_timer() {
        let fx = fixture();
        let operator = Actor::operator(OperatorId::new());
        let trip = fx.coordinator.start_trip(&operator, fx.carrier, None).await.unwrap();

        let first = fx
            .coordinator
            .arrive_at_stop(&operator, trip.id, fx.stops[0])
            .await
            .unwrap();
        fx.clock.advance(Duration::seconds(90));
        let again = fx
            .coordinator
            .arrive_at_stop(&operator, trip.id, fx.stops[0])
            .await
            .unwrap();
        assert_eq!(first.arrived_at, again.arrived_at);

        let moved = fx
            .coordinator
            .arrive_at_stop(&operator, trip.id, fx.stops[1])
            .await
            .unwrap();
        assert_eq!(moved.arrived_at, Some(fx.clock.now()));
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_retryable_without_partial_writes() {
        let (routes, carrier, stops, rider) = route();
        let clock = ManualClock::new(Utc::now());
        let operator_id = OperatorId::new();

        let mut trip = Trip::start(carrier, operator_id, None, clock.now());
        trip.arrive(stops[0], clock.now()).unwrap();
        let stored_trip = trip.clone();

        let mut trips = MockTripStore::new();
        trips
            .expect_get_trip()
            .returning(move |_| Ok(Some(stored_trip.clone())));
        trips.expect_save_state().never();

        let mut signals = MockSignalStore::new();
        signals
            .expect_rider_signals()
            .returning(|_| Ok(Default::default()));
        signals
            .expect_upsert_wait()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection reset".into())));

        let coordinator = TripCoordinator::new(
            TripStores::new(Arc::new(trips), Arc::new(signals), Arc::new(routes)),
            Arc::new(clock),
        );

        let err = coordinator
            .request_wait(&Actor::rider(rider), trip.id, rider, stops[0])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "store_unavailable");
    }

    #[tokio::test]
    async fn concurrent_end_turns_departure_into_trip_ended() {
        let (routes, carrier, stops, _) = route();
        let clock = ManualClock::new(Utc::now());
        let operator_id = OperatorId::new();

        let mut trip = Trip::start(carrier, operator_id, None, clock.now());
        trip.arrive(stops[0], clock.now()).unwrap();
        let stored_trip = trip.clone();

        let mut trips = MockTripStore::new();
        trips
            .expect_get_trip()
            .returning(move |_| Ok(Some(stored_trip.clone())));
        trips.expect_save_state().times(1).returning(|_| Ok(false));

        let coordinator = TripCoordinator::new(
            TripStores::new(
                Arc::new(trips),
                Arc::new(InMemorySignalStore::new()),
                Arc::new(routes),
            ),
            Arc::new(clock),
        );

        let err = coordinator
            .depart_stop(&Actor::operator(operator_id), trip.id)
            .await
            .unwrap_err();
        assert_eq!(err, CoordinatorError::TripEnded(trip.id));
    }

    #[tokio::test]
    async fn position_updates_after_end_are_ignored() {
        let fx = fixture();
        let operator = Actor::operator(OperatorId::new());
        let trip = fx.coordinator.start_trip(&operator, fx.carrier, None).await.unwrap();
        let point = GeoPoint::new(48.2, 11.6).unwrap();

        assert!(fx.coordinator.update_position(&operator, trip.id, point).await.unwrap());
        fx.coordinator.end_trip(&operator, trip.id).await.unwrap();
        assert!(!fx.coordinator.update_position(&operator, trip.id, point).await.unwrap());
    }
}
