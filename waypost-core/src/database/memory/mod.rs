//! Process-local stores backed by `DashMap`, used by tests and single-node
//! deployments.

pub mod routes;
pub mod signals;
pub mod trips;

pub use routes::{RouteSeed, SeedError, StaticRouteDirectory};
pub use signals::InMemorySignalStore;
pub use trips::InMemoryTripStore;

pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 1024;
