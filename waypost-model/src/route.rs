use crate::error::{ModelError, Result};
use crate::ids::{CarrierId, RiderId, StopId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// WGS84 coordinate reported by the operator device or stored for a stop
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok =
            self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(ModelError::InvalidPosition {
                latitude: self.latitude.to_string(),
                longitude: self.longitude.to_string(),
            })
        }
    }
}

/// Fixed waypoint on a carrier's route
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub position: GeoPoint,
    /// Zero-based position in the carrier's ordered stop list
    pub sequence: u32,
}

/// Vehicle/route entity that runs trips. The stop list is ordered and does
/// not change while a trip is running.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Carrier {
    pub id: CarrierId,
    pub name: String,
    pub stops: Vec<Stop>,
}

impl Carrier {
    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|stop| stop.id == id)
    }

    pub fn has_stop(&self, id: StopId) -> bool {
        self.stop(id).is_some()
    }

    pub fn stop_ids(&self) -> impl Iterator<Item = StopId> + '_ {
        self.stops.iter().map(|stop| stop.id)
    }
}

/// Party assigned to board a carrier at a specific stop
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rider {
    pub id: RiderId,
    pub carrier_id: CarrierId,
    pub stop_id: StopId,
    pub display_name: String,
}
