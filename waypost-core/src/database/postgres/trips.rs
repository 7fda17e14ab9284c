use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::broadcast;
use uuid::Uuid;
use waypost_model::{
    CarrierId, GeoPoint, OperatorId, PositionFix, StopId, Trip, TripId, TripPhase,
};

use crate::database::ports::{TripChange, TripChangeKind, TripStore};
use crate::error::{StoreError, StoreResult};

const TRIP_COLUMNS: &str = r#"
    id,
    carrier_id,
    operator_id,
    started_at,
    ended_at,
    current_stop_id,
    arrived_at,
    phase,
    last_latitude,
    last_longitude,
    position_reported_at
"#;

#[derive(Debug, FromRow)]
struct TripRow {
    id: Uuid,
    carrier_id: Uuid,
    operator_id: Uuid,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    current_stop_id: Option<Uuid>,
    arrived_at: Option<DateTime<Utc>>,
    phase: String,
    last_latitude: Option<f64>,
    last_longitude: Option<f64>,
    position_reported_at: Option<DateTime<Utc>>,
}

impl TripRow {
    fn into_trip(self) -> StoreResult<Trip> {
        let phase = TripPhase::parse(&self.phase).ok_or_else(|| {
            StoreError::Corrupt(format!("trip {} has unknown phase {:?}", self.id, self.phase))
        })?;

        let last_position = match (self.last_latitude, self.last_longitude, self.position_reported_at) {
            (Some(latitude), Some(longitude), Some(reported_at)) => Some(PositionFix {
                position: GeoPoint {
                    latitude,
                    longitude,
                },
                reported_at,
            }),
            _ => None,
        };

        Ok(Trip {
            id: TripId(self.id),
            carrier_id: CarrierId(self.carrier_id),
            operator_id: OperatorId(self.operator_id),
            started_at: self.started_at,
            ended_at: self.ended_at,
            current_stop: self.current_stop_id.map(StopId),
            arrived_at: self.arrived_at,
            phase,
            last_position,
        })
    }
}

/// Trip rows in the `trips` table. Change notifications are delivered by
/// the change feed that created this store.
#[derive(Clone)]
pub struct PostgresTripStore {
    pool: PgPool,
    changes: broadcast::Sender<TripChange>,
}

impl PostgresTripStore {
    pub(crate) fn new(pool: PgPool, changes: broadcast::Sender<TripChange>) -> Self {
        Self { pool, changes }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl fmt::Debug for PostgresTripStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresTripStore")
            .field("pool_size", &self.pool.size())
            .field("subscribers", &self.changes.receiver_count())
            .finish()
    }
}

#[async_trait]
impl TripStore for PostgresTripStore {
    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        let (latitude, longitude, reported_at) = split_position(trip.last_position.as_ref());

        sqlx::query(
            r#"
            INSERT INTO trips (
                id, carrier_id, operator_id, started_at, ended_at,
                current_stop_id, arrived_at, phase,
                last_latitude, last_longitude, position_reported_at,
                last_change
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'started')
            "#,
        )
        .bind(trip.id.as_uuid())
        .bind(trip.carrier_id.as_uuid())
        .bind(trip.operator_id.as_uuid())
        .bind(trip.started_at)
        .bind(trip.ended_at)
        .bind(trip.current_stop.map(|stop| stop.to_uuid()))
        .bind(trip.arrived_at)
        .bind(trip.phase.as_str())
        .bind(latitude)
        .bind(longitude)
        .bind(reported_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn get_trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        row.map(TripRow::into_trip).transpose()
    }

    async fn active_trip(&self, carrier: CarrierId) -> StoreResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE carrier_id = $1 AND ended_at IS NULL"
        ))
        .bind(carrier.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        row.map(TripRow::into_trip).transpose()
    }

    async fn save_state(&self, trip: &Trip) -> StoreResult<bool> {
        let change = if trip.is_ended() {
            TripChangeKind::Ended
        } else {
            TripChangeKind::StateChanged
        };

        let result = sqlx::query(
            r#"
            UPDATE trips
            SET phase = $2,
                current_stop_id = $3,
                arrived_at = $4,
                ended_at = $5,
                revision = nextval('waypost_revision_seq'),
                last_change = $6
            WHERE id = $1 AND ended_at IS NULL
            "#,
        )
        .bind(trip.id.as_uuid())
        .bind(trip.phase.as_str())
        .bind(trip.current_stop.map(|stop| stop.to_uuid()))
        .bind(trip.arrived_at)
        .bind(trip.ended_at)
        .bind(change.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_position(&self, id: TripId, fix: &PositionFix) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET last_latitude = $2,
                last_longitude = $3,
                position_reported_at = $4,
                revision = nextval('waypost_revision_seq'),
                last_change = 'position'
            WHERE id = $1 AND ended_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(fix.position.latitude)
        .bind(fix.position.longitude)
        .bind(fix.reported_at)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    fn subscribe(&self) -> broadcast::Receiver<TripChange> {
        self.changes.subscribe()
    }
}

fn split_position(
    fix: Option<&PositionFix>,
) -> (Option<f64>, Option<f64>, Option<DateTime<Utc>>) {
    match fix {
        Some(fix) => (
            Some(fix.position.latitude),
            Some(fix.position.longitude),
            Some(fix.reported_at),
        ),
        None => (None, None, None),
    }
}
