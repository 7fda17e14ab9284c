use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use waypost_model::{
    Carrier, CarrierId, GeoPoint, ModelError, Rider, RiderId, Stop, StopId,
};

use crate::database::ports::RouteDirectory;
use crate::error::StoreResult;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read route seed {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse route seed {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse route seed {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid route seed: {0}")]
    Invalid(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// File representation of the static route store. Stop order in the file is
/// the route order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouteSeed {
    pub carriers: Vec<CarrierSeed>,
    pub riders: Vec<RiderSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarrierSeed {
    pub id: CarrierId,
    pub name: String,
    #[serde(default)]
    pub stops: Vec<StopSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopSeed {
    pub id: StopId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiderSeed {
    pub id: RiderId,
    pub carrier_id: CarrierId,
    pub stop_id: StopId,
    pub display_name: String,
}

impl RouteSeed {
    /// Load a seed file; `.json` files are parsed as JSON, anything else as
    /// TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&raw).map_err(|source| SeedError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else {
            toml::from_str(&raw).map_err(|source| SeedError::Toml {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Immutable route directory held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticRouteDirectory {
    carriers: HashMap<CarrierId, Carrier>,
    riders: HashMap<RiderId, Rider>,
}

impl StaticRouteDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: RouteSeed) -> Result<Self, SeedError> {
        let mut directory = Self::new();

        for carrier in seed.carriers {
            let stops = carrier
                .stops
                .into_iter()
                .enumerate()
                .map(|(sequence, stop)| {
                    Ok(Stop {
                        id: stop.id,
                        name: stop.name,
                        position: GeoPoint::new(stop.latitude, stop.longitude)?,
                        sequence: sequence as u32,
                    })
                })
                .collect::<Result<Vec<_>, ModelError>>()?;

            directory.insert_carrier(Carrier {
                id: carrier.id,
                name: carrier.name,
                stops,
            })?;
        }

        for rider in seed.riders {
            directory.assign_rider(Rider {
                id: rider.id,
                carrier_id: rider.carrier_id,
                stop_id: rider.stop_id,
                display_name: rider.display_name,
            })?;
        }

        info!(
            carriers = directory.carriers.len(),
            riders = directory.riders.len(),
            "route directory loaded"
        );
        Ok(directory)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        Self::from_seed(RouteSeed::load(path)?)
    }

    pub fn insert_carrier(&mut self, carrier: Carrier) -> Result<(), SeedError> {
        if self.carriers.contains_key(&carrier.id) {
            return Err(SeedError::Invalid(format!(
                "carrier {} listed twice",
                carrier.id
            )));
        }

        let stop_owned_elsewhere = carrier.stops.iter().any(|stop| {
            self.carriers
                .values()
                .any(|other| other.has_stop(stop.id))
        });
        if stop_owned_elsewhere {
            return Err(SeedError::Invalid(format!(
                "carrier {} shares a stop id with another carrier",
                carrier.id
            )));
        }

        self.carriers.insert(carrier.id, carrier);
        Ok(())
    }

    /// Register a rider; the assigned stop must be on the rider's carrier.
    pub fn assign_rider(&mut self, rider: Rider) -> Result<(), SeedError> {
        let carrier = self.carriers.get(&rider.carrier_id).ok_or_else(|| {
            SeedError::Invalid(format!(
                "rider {} references unknown carrier {}",
                rider.id, rider.carrier_id
            ))
        })?;
        if !carrier.has_stop(rider.stop_id) {
            return Err(SeedError::Invalid(format!(
                "rider {} is assigned to stop {} which is not on carrier {}",
                rider.id, rider.stop_id, rider.carrier_id
            )));
        }

        self.riders.insert(rider.id, rider);
        Ok(())
    }

    pub fn carriers(&self) -> impl Iterator<Item = &Carrier> {
        self.carriers.values()
    }

    pub fn riders(&self) -> impl Iterator<Item = &Rider> {
        self.riders.values()
    }
}

#[async_trait]
impl RouteDirectory for StaticRouteDirectory {
    async fn carrier(&self, id: CarrierId) -> StoreResult<Option<Carrier>> {
        Ok(self.carriers.get(&id).cloned())
    }

    async fn rider(&self, id: RiderId) -> StoreResult<Option<Rider>> {
        Ok(self.riders.get(&id).cloned())
    }

    async fn rider_counts(&self, carrier: CarrierId) -> StoreResult<HashMap<StopId, u32>> {
        let mut counts = HashMap::new();
        for rider in self.riders.values().filter(|r| r.carrier_id == carrier) {
            *counts.entry(rider.stop_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
