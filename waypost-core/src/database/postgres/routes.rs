use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;
use waypost_model::{Carrier, CarrierId, GeoPoint, Rider, RiderId, Stop, StopId};

use crate::database::memory::StaticRouteDirectory;
use crate::database::ports::RouteDirectory;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, FromRow)]
struct StopRow {
    id: Uuid,
    name: String,
    latitude: f64,
    longitude: f64,
    sequence: i32,
}

#[derive(Debug, FromRow)]
struct RiderRow {
    id: Uuid,
    carrier_id: Uuid,
    stop_id: Uuid,
    display_name: String,
}

impl RiderRow {
    fn into_rider(self) -> Rider {
        Rider {
            id: RiderId(self.id),
            carrier_id: CarrierId(self.carrier_id),
            stop_id: StopId(self.stop_id),
            display_name: self.display_name,
        }
    }
}

/// Route directory read from the `carriers`, `stops` and `riders` tables.
#[derive(Clone)]
pub struct PostgresRouteDirectory {
    pool: PgPool,
}

impl PostgresRouteDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upsert every carrier, stop and rider of a seed directory in one
    /// transaction.
    pub async fn import(&self, directory: &StaticRouteDirectory) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        let mut stop_count = 0usize;

        for carrier in directory.carriers() {
            sqlx::query(
                r#"
                INSERT INTO carriers (id, name) VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
                "#,
            )
            .bind(carrier.id.as_uuid())
            .bind(&carrier.name)
            .execute(&mut *tx)
            .await?;

            for stop in &carrier.stops {
                sqlx::query(
                    r#"
                    INSERT INTO stops (id, carrier_id, name, latitude, longitude, sequence)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO UPDATE
                    SET name = EXCLUDED.name,
                        latitude = EXCLUDED.latitude,
                        longitude = EXCLUDED.longitude,
                        sequence = EXCLUDED.sequence
                    "#,
                )
                .bind(stop.id.as_uuid())
                .bind(carrier.id.as_uuid())
                .bind(&stop.name)
                .bind(stop.position.latitude)
                .bind(stop.position.longitude)
                .bind(stop.sequence as i32)
                .execute(&mut *tx)
                .await?;
                stop_count += 1;
            }
        }

        let mut rider_count = 0usize;
        for rider in directory.riders() {
            sqlx::query(
                r#"
                INSERT INTO riders (id, carrier_id, stop_id, display_name)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET carrier_id = EXCLUDED.carrier_id,
                    stop_id = EXCLUDED.stop_id,
                    display_name = EXCLUDED.display_name
                "#,
            )
            .bind(rider.id.as_uuid())
            .bind(rider.carrier_id.as_uuid())
            .bind(rider.stop_id.as_uuid())
            .bind(&rider.display_name)
            .execute(&mut *tx)
            .await?;
            rider_count += 1;
        }

        tx.commit().await?;
        info!(stops = stop_count, riders = rider_count, "route seed imported");
        Ok(())
    }
}

impl fmt::Debug for PostgresRouteDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresRouteDirectory")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

#[async_trait]
impl RouteDirectory for PostgresRouteDirectory {
    async fn carrier(&self, id: CarrierId) -> StoreResult<Option<Carrier>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM carriers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.pool())
            .await?;
        let Some(name) = name else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, StopRow>(
            r#"
            SELECT id, name, latitude, longitude, sequence
            FROM stops
            WHERE carrier_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(self.pool())
        .await?;

        let stops = rows
            .into_iter()
            .map(|row| {
                let position = GeoPoint::new(row.latitude, row.longitude)
                    .map_err(|err| StoreError::Corrupt(format!("stop {}: {err}", row.id)))?;
                Ok(Stop {
                    id: StopId(row.id),
                    name: row.name,
                    position,
                    sequence: u32::try_from(row.sequence).map_err(|_| {
                        StoreError::Corrupt(format!("stop {} has negative sequence", row.id))
                    })?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(Carrier { id, name, stops }))
    }

    async fn rider(&self, id: RiderId) -> StoreResult<Option<Rider>> {
        let row = sqlx::query_as::<_, RiderRow>(
            "SELECT id, carrier_id, stop_id, display_name FROM riders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(RiderRow::into_rider))
    }

    async fn rider_counts(&self, carrier: CarrierId) -> StoreResult<HashMap<StopId, u32>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT stop_id, COUNT(*) FROM riders WHERE carrier_id = $1 GROUP BY stop_id",
        )
        .bind(carrier.as_uuid())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(stop, count)| (StopId(stop), u32::try_from(count).unwrap_or(u32::MAX)))
            .collect())
    }
}
