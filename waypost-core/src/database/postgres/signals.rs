use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::broadcast;
use uuid::Uuid;
use waypost_model::{
    AbsenceSignal, RiderId, RiderSignals, SignalKey, StopId, TripId, TripSignals,
    WaitSignal,
};

use crate::database::ports::{AbsenceWrite, SignalChange, SignalStore, WaitWrite};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, FromRow)]
struct SignalRow {
    trip_id: Uuid,
    rider_id: Uuid,
    stop_id: Uuid,
    wait_signaled_at: Option<DateTime<Utc>>,
    absent_marked_at: Option<DateTime<Utc>>,
}

impl SignalRow {
    fn into_signals(self) -> RiderSignals {
        let trip_id = TripId(self.trip_id);
        let rider_id = RiderId(self.rider_id);
        let stop_id = StopId(self.stop_id);

        RiderSignals {
            wait: self.wait_signaled_at.map(|signaled_at| WaitSignal {
                trip_id,
                rider_id,
                stop_id,
                signaled_at,
            }),
            absence: self.absent_marked_at.map(|marked_at| AbsenceSignal {
                trip_id,
                rider_id,
                stop_id,
                marked_at,
            }),
        }
    }
}

/// Rider facts in `rider_signals`, one row per (trip, rider).
///
/// Both facts live in the same row so the "wait only while not absent" and
/// "absence clears wait" rules are single conditional upserts.
#[derive(Clone)]
pub struct PostgresSignalStore {
    pool: PgPool,
    changes: broadcast::Sender<SignalChange>,
}

impl PostgresSignalStore {
    pub(crate) fn new(pool: PgPool, changes: broadcast::Sender<SignalChange>) -> Self {
        Self { pool, changes }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_row(&self, key: SignalKey) -> StoreResult<Option<SignalRow>> {
        let row = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT trip_id, rider_id, stop_id, wait_signaled_at, absent_marked_at
            FROM rider_signals
            WHERE trip_id = $1 AND rider_id = $2
            "#,
        )
        .bind(key.trip_id.as_uuid())
        .bind(key.rider_id.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    async fn existing_absence(&self, key: SignalKey) -> StoreResult<AbsenceSignal> {
        self.fetch_row(key)
            .await?
            .and_then(|row| row.into_signals().absence)
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "conditional write for trip {} rider {} was refused but no absence is stored",
                    key.trip_id, key.rider_id
                ))
            })
    }
}

impl fmt::Debug for PostgresSignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresSignalStore")
            .field("pool_size", &self.pool.size())
            .field("subscribers", &self.changes.receiver_count())
            .finish()
    }
}

#[async_trait]
impl SignalStore for PostgresSignalStore {
    async fn upsert_wait(&self, signal: &WaitSignal) -> StoreResult<WaitWrite> {
        let stored = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO rider_signals (
                trip_id, rider_id, stop_id, wait_signaled_at, last_change
            )
            VALUES ($1, $2, $3, $4, 'wait')
            ON CONFLICT (trip_id, rider_id) DO UPDATE
            SET stop_id = EXCLUDED.stop_id,
                wait_signaled_at = EXCLUDED.wait_signaled_at,
                revision = nextval('waypost_revision_seq'),
                last_change = 'wait'
            WHERE rider_signals.absent_marked_at IS NULL
            RETURNING trip_id
            "#,
        )
        .bind(signal.trip_id.as_uuid())
        .bind(signal.rider_id.as_uuid())
        .bind(signal.stop_id.as_uuid())
        .bind(signal.signaled_at)
        .fetch_optional(self.pool())
        .await?;

        match stored {
            Some(_) => Ok(WaitWrite::Stored(*signal)),
            None => Ok(WaitWrite::Blocked(self.existing_absence(signal.key()).await?)),
        }
    }

    async fn record_absence(&self, signal: &AbsenceSignal) -> StoreResult<AbsenceWrite> {
        let created = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO rider_signals (
                trip_id, rider_id, stop_id, absent_marked_at, last_change
            )
            VALUES ($1, $2, $3, $4, 'absence')
            ON CONFLICT (trip_id, rider_id) DO UPDATE
            SET stop_id = EXCLUDED.stop_id,
                absent_marked_at = EXCLUDED.absent_marked_at,
                wait_signaled_at = NULL,
                revision = nextval('waypost_revision_seq'),
                last_change = 'absence'
            WHERE rider_signals.absent_marked_at IS NULL
            RETURNING trip_id
            "#,
        )
        .bind(signal.trip_id.as_uuid())
        .bind(signal.rider_id.as_uuid())
        .bind(signal.stop_id.as_uuid())
        .bind(signal.marked_at)
        .fetch_optional(self.pool())
        .await?;

        match created {
            Some(_) => Ok(AbsenceWrite::Created(*signal)),
            None => Ok(AbsenceWrite::Existing(
                self.existing_absence(signal.key()).await?,
            )),
        }
    }

    async fn rider_signals(&self, key: SignalKey) -> StoreResult<RiderSignals> {
        Ok(self
            .fetch_row(key)
            .await?
            .map(SignalRow::into_signals)
            .unwrap_or_default())
    }

    async fn trip_signals(&self, trip: TripId) -> StoreResult<TripSignals> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT trip_id, rider_id, stop_id, wait_signaled_at, absent_marked_at
            FROM rider_signals
            WHERE trip_id = $1
            "#,
        )
        .bind(trip.as_uuid())
        .fetch_all(self.pool())
        .await?;

        Ok(collect_signals(rows))
    }

    async fn stop_signals(&self, trip: TripId, stop: StopId) -> StoreResult<TripSignals> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT trip_id, rider_id, stop_id, wait_signaled_at, absent_marked_at
            FROM rider_signals
            WHERE trip_id = $1 AND stop_id = $2
            "#,
        )
        .bind(trip.as_uuid())
        .bind(stop.as_uuid())
        .fetch_all(self.pool())
        .await?;

        Ok(collect_signals(rows))
    }

    fn subscribe(&self) -> broadcast::Receiver<SignalChange> {
        self.changes.subscribe()
    }
}

fn collect_signals(rows: Vec<SignalRow>) -> TripSignals {
    let mut signals = TripSignals::default();
    for row in rows {
        let row = row.into_signals();
        signals.waits.extend(row.wait);
        signals.absences.extend(row.absence);
    }
    signals
}
