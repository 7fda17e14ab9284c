pub mod routes;
pub mod signals;
pub mod trips;

pub use routes::RouteDirectory;
pub use signals::{AbsenceWrite, SignalChange, SignalStore, WaitWrite};
pub use trips::{TripChange, TripChangeKind, TripStore};

#[cfg(test)]
pub use signals::MockSignalStore;
#[cfg(test)]
pub use trips::MockTripStore;
