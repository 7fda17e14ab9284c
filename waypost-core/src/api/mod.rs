//! Wire-level pieces shared by the server and its clients.

pub mod requests;
pub mod responses;
pub mod routes;

pub use requests::{ArriveRequest, PositionAccepted, PositionRequest, SignalRequest, StartTripRequest};
pub use responses::ApiResponse;
