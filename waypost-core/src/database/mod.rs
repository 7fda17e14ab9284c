pub mod memory;
pub mod ports;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod stores;

pub use stores::TripStores;
