use serde::{Deserialize, Serialize};
use waypost_model::{CarrierId, GeoPoint, ModelError, RiderId, StopId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionRequest {
    pub fn to_point(self) -> Result<GeoPoint, ModelError> {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartTripRequest {
    pub carrier_id: CarrierId,
    #[serde(default)]
    pub position: Option<PositionRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArriveRequest {
    pub stop_id: StopId,
}

/// Body of both rider signal endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRequest {
    pub rider_id: RiderId,
    pub stop_id: StopId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAccepted {
    /// False when the trip had already ended and the fix was dropped.
    pub accepted: bool,
}
