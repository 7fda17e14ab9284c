#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use chrono::Utc;
use serde_json::Value;
use waypost_core::ManualClock;
use waypost_core::database::memory::StaticRouteDirectory;
use waypost_model::{
    Actor, Carrier, CarrierId, GeoPoint, OperatorId, Rider, RiderId, Stop, StopId,
};
use waypost_server::infra::{config::Config, startup::in_memory_state};
use waypost_server::routes::create_app;

pub struct TestApp {
    pub server: TestServer,
    pub clock: ManualClock,
    pub carrier: CarrierId,
    pub stops: Vec<StopId>,
    /// Two riders at the first stop, one at the second.
    pub riders: Vec<(RiderId, StopId)>,
    pub operator: Actor,
}

impl TestApp {
    pub fn new() -> Self {
        let stops: Vec<Stop> = (0..2)
            .map(|sequence| Stop {
                id: StopId::new(),
                name: format!("Stop {sequence}"),
                position: GeoPoint::new(52.37 + sequence as f64 * 0.01, 4.89).unwrap(),
                sequence,
            })
            .collect();
        let stop_ids: Vec<StopId> = stops.iter().map(|stop| stop.id).collect();
        let carrier = Carrier {
            id: CarrierId::new(),
            name: "Harbour loop".into(),
            stops,
        };
        let carrier_id = carrier.id;

        let mut routes = StaticRouteDirectory::new();
        routes.insert_carrier(carrier).unwrap();

        let mut riders = Vec::new();
        for (n, stop_id) in [stop_ids[0], stop_ids[0], stop_ids[1]].into_iter().enumerate() {
            let rider = Rider {
                id: RiderId::new(),
                carrier_id,
                stop_id,
                display_name: format!("Rider {n}"),
            };
            riders.push((rider.id, stop_id));
            routes.assign_rider(rider).unwrap();
        }

        let clock = ManualClock::new(Utc::now());
        let state = in_memory_state(
            Arc::new(Config::default()),
            routes,
            Arc::new(clock.clone()),
        );
        let server = TestServer::new(create_app(state)).expect("test server");

        Self {
            server,
            clock,
            carrier: carrier_id,
            stops: stop_ids,
            riders,
            operator: Actor::operator(OperatorId::new()),
        }
    }

    pub fn rider(&self, n: usize) -> (Actor, RiderId, StopId) {
        let (rider_id, stop_id) = self.riders[n];
        (Actor::rider(rider_id), rider_id, stop_id)
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }
}

/// Identity headers for `actor`.
pub fn identity(actor: &Actor) -> [(&'static str, String); 2] {
    [
        ("x-actor-id", actor.id.to_string()),
        ("x-actor-role", actor.role.to_string()),
    ]
}

pub fn data(body: &Value) -> &Value {
    &body["data"]
}
