use std::collections::HashMap;

use async_trait::async_trait;
use waypost_model::{Carrier, CarrierId, Rider, RiderId, StopId};

use crate::error::StoreResult;

/// Read-only view of carriers, their stops and rider assignments.
#[async_trait]
pub trait RouteDirectory: Send + Sync {
    async fn carrier(&self, id: CarrierId) -> StoreResult<Option<Carrier>>;

    async fn rider(&self, id: RiderId) -> StoreResult<Option<Rider>>;

    /// Number of riders assigned to each stop of the carrier. Stops with no
    /// riders may be absent from the map.
    async fn rider_counts(&self, carrier: CarrierId) -> StoreResult<HashMap<StopId, u32>>;
}
