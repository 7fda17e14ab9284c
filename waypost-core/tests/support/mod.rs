#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use waypost_core::database::memory::StaticRouteDirectory;
use waypost_core::model::{
    Actor, Carrier, CarrierId, GeoPoint, OperatorId, Rider, RiderId, Stop, StopId,
};
use waypost_core::{LiveSubscription, LiveUpdate, ManualClock, TripCoordinator, TripStores};

pub struct Harness {
    pub coordinator: TripCoordinator,
    pub clock: ManualClock,
    pub carrier: CarrierId,
    pub stops: Vec<StopId>,
    /// Riders grouped by the index of their assigned stop.
    pub riders: Vec<Vec<RiderId>>,
    pub operator: Actor,
}

impl Harness {
    /// One carrier whose stop `i` has `riders_per_stop[i]` assigned riders.
    pub fn new(riders_per_stop: &[usize]) -> Self {
        let carrier = Carrier {
            id: CarrierId::new(),
            name: "Route 42".into(),
            stops: riders_per_stop
                .iter()
                .enumerate()
                .map(|(sequence, _)| Stop {
                    id: StopId::new(),
                    name: format!("Stop {sequence}"),
                    position: GeoPoint::new(40.0 + sequence as f64 * 0.01, -74.0).unwrap(),
                    sequence: sequence as u32,
                })
                .collect(),
        };
        let carrier_id = carrier.id;
        let stops: Vec<_> = carrier.stop_ids().collect();

        let mut routes = StaticRouteDirectory::new();
        routes.insert_carrier(carrier).unwrap();

        let mut riders = Vec::new();
        for (index, count) in riders_per_stop.iter().enumerate() {
            let mut at_stop = Vec::new();
            for n in 0..*count {
                let rider = Rider {
                    id: RiderId::new(),
                    carrier_id,
                    stop_id: stops[index],
                    display_name: format!("Rider {index}.{n}"),
                };
                at_stop.push(rider.id);
                routes.assign_rider(rider).unwrap();
            }
            riders.push(at_stop);
        }

        let clock = ManualClock::new(Utc::now());
        let coordinator =
            TripCoordinator::new(TripStores::in_memory(routes), Arc::new(clock.clone()));

        Self {
            coordinator,
            clock,
            carrier: carrier_id,
            stops,
            riders,
            operator: Actor::operator(OperatorId::new()),
        }
    }

    pub fn rider(&self, stop_index: usize, n: usize) -> (Actor, RiderId) {
        let id = self.riders[stop_index][n];
        (Actor::rider(id), id)
    }

    pub fn clock_now(&self) -> chrono::DateTime<Utc> {
        use waypost_core::Clock;
        self.clock.now()
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }
}

/// Next live update, failing the test if none arrives within five
/// (virtual) seconds.
pub async fn next_update(subscription: &mut LiveSubscription) -> LiveUpdate {
    tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("timed out waiting for live update")
        .expect("live stream closed")
}

/// Assert that nothing is pushed for `window`.
pub async fn assert_quiet(subscription: &mut LiveSubscription, window: Duration) {
    if let Ok(update) = tokio::time::timeout(window, subscription.recv()).await {
        panic!("unexpected live update: {update:?}");
    }
}
