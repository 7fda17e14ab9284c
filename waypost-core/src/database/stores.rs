use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use super::memory::{InMemorySignalStore, InMemoryTripStore, StaticRouteDirectory};
use super::ports::{RouteDirectory, SignalStore, TripStore};
#[cfg(feature = "postgres")]
use super::postgres::{PostgresChangeFeed, PostgresDatabase, PostgresRouteDirectory};

/// The three store ports the coordinator and the live publisher work
/// against.
#[derive(Clone)]
pub struct TripStores {
    pub trips: Arc<dyn TripStore>,
    pub signals: Arc<dyn SignalStore>,
    pub routes: Arc<dyn RouteDirectory>,
}

impl TripStores {
    pub fn new(
        trips: Arc<dyn TripStore>,
        signals: Arc<dyn SignalStore>,
        routes: Arc<dyn RouteDirectory>,
    ) -> Self {
        Self {
            trips,
            signals,
            routes,
        }
    }

    pub fn in_memory(routes: StaticRouteDirectory) -> Self {
        Self {
            trips: Arc::new(InMemoryTripStore::new()),
            signals: Arc::new(InMemorySignalStore::new()),
            routes: Arc::new(routes),
        }
    }

    /// Stores backed by `db`, notified through `feed`. The feed still has to
    /// be spawned by the caller.
    #[cfg(feature = "postgres")]
    pub fn postgres(db: &PostgresDatabase, feed: &PostgresChangeFeed) -> Self {
        Self {
            trips: Arc::new(feed.trip_store()),
            signals: Arc::new(feed.signal_store()),
            routes: Arc::new(PostgresRouteDirectory::new(db.pool().clone())),
        }
    }
}

impl fmt::Debug for TripStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripStores")
            .field("trips", &type_name_of_val(self.trips.as_ref()))
            .field("signals", &type_name_of_val(self.signals.as_ref()))
            .field("routes", &type_name_of_val(self.routes.as_ref()))
            .finish()
    }
}
