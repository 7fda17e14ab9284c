use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use sqlx::{FromRow, PgPool};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;
use waypost_model::{CarrierId, RiderId, SignalKind, StopId, TripId};

use super::{PostgresDatabase, PostgresSignalStore, PostgresTripStore};
use crate::database::ports::{SignalChange, TripChange, TripChangeKind};
use crate::error::StoreResult;

const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_FETCH_LIMIT: i64 = 512;
const DEFAULT_LOOKBACK: i64 = 64;
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone, Debug)]
pub struct ChangeFeedConfig {
    pub poll_interval: Duration,
    pub fetch_limit: i64,
    /// Revisions below the cursor that are re-read on every poll. Sequence
    /// values are handed out before commit, so a slow transaction can land
    /// a revision lower than one already seen.
    pub lookback: i64,
    pub channel_capacity: usize,
}

impl Default for ChangeFeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            lookback: DEFAULT_LOOKBACK,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, FromRow)]
struct TripRevisionRow {
    id: Uuid,
    carrier_id: Uuid,
    revision: i64,
    last_change: String,
}

#[derive(Debug, FromRow)]
struct SignalRevisionRow {
    trip_id: Uuid,
    rider_id: Uuid,
    stop_id: Uuid,
    revision: i64,
    last_change: String,
}

/// Polls `trips` and `rider_signals` for new revisions and rebroadcasts
/// them to in-process subscribers.
pub struct PostgresChangeFeed {
    pool: PgPool,
    config: ChangeFeedConfig,
    trips: broadcast::Sender<TripChange>,
    signals: broadcast::Sender<SignalChange>,
}

impl PostgresChangeFeed {
    pub fn new(db: &PostgresDatabase, config: ChangeFeedConfig) -> Self {
        let mut config = config;
        // Progress requires each page to reach past the re-read window.
        config.fetch_limit = config.fetch_limit.max(config.lookback + 1);

        let (trips, _) = broadcast::channel(config.channel_capacity);
        let (signals, _) = broadcast::channel(config.channel_capacity);
        Self {
            pool: db.pool().clone(),
            config,
            trips,
            signals,
        }
    }

    pub fn trip_store(&self) -> PostgresTripStore {
        PostgresTripStore::new(self.pool.clone(), self.trips.clone())
    }

    pub fn signal_store(&self) -> PostgresSignalStore {
        PostgresSignalStore::new(self.pool.clone(), self.signals.clone())
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let mut cursor = loop {
            match current_revision(&self.pool).await {
                Ok(revision) => break revision,
                Err(err) => {
                    warn!(error = %err, "change feed could not read starting revision");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = sleep(self.config.poll_interval) => {}
                    }
                }
            }
        };
        info!(cursor, "change feed started");

        let mut seen = BTreeSet::new();
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("change feed stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.poll_once(&mut cursor, &mut seen).await {
                Ok(0) => {}
                Ok(emitted) => debug!(emitted, cursor, "change feed emitted changes"),
                Err(err) => warn!(error = %err, "change feed poll failed"),
            }
        }
    }

    async fn poll_once(&self, cursor: &mut i64, seen: &mut BTreeSet<i64>) -> StoreResult<usize> {
        let floor = (*cursor - self.config.lookback).max(0);
        *seen = seen.split_off(&(floor + 1));
        let mut emitted = 0;

        let trip_rows = sqlx::query_as::<_, TripRevisionRow>(
            r#"
            SELECT id, carrier_id, revision, last_change
            FROM trips
            WHERE revision > $1
            ORDER BY revision ASC
            LIMIT $2
            "#,
        )
        .bind(floor)
        .bind(self.config.fetch_limit)
        .fetch_all(&self.pool)
        .await?;

        let signal_rows = sqlx::query_as::<_, SignalRevisionRow>(
            r#"
            SELECT trip_id, rider_id, stop_id, revision, last_change
            FROM rider_signals
            WHERE revision > $1
            ORDER BY revision ASC
            LIMIT $2
            "#,
        )
        .bind(floor)
        .bind(self.config.fetch_limit)
        .fetch_all(&self.pool)
        .await?;

        // A full page may have stopped short of revisions the other table
        // already returned; never move the cursor past the end of a full page.
        let ceiling = [
            full_page_end(trip_rows.iter().map(|row| row.revision), self.config.fetch_limit),
            full_page_end(signal_rows.iter().map(|row| row.revision), self.config.fetch_limit),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(i64::MAX);

        for row in trip_rows {
            *cursor = (*cursor).max(row.revision.min(ceiling));
            if !seen.insert(row.revision) {
                continue;
            }
            let Some(kind) = TripChangeKind::parse(&row.last_change) else {
                warn!(trip_id = %row.id, change = %row.last_change, "skipping unknown trip change");
                continue;
            };
            let change = TripChange {
                trip_id: TripId(row.id),
                carrier_id: CarrierId(row.carrier_id),
                kind,
            };
            if self.trips.send(change).is_err() {
                trace!(trip_id = %row.id, "no trip change subscribers");
            }
            emitted += 1;
        }

        for row in signal_rows {
            *cursor = (*cursor).max(row.revision.min(ceiling));
            if !seen.insert(row.revision) {
                continue;
            }
            let kind = match row.last_change.as_str() {
                "wait" => SignalKind::Wait,
                "absence" => SignalKind::Absence,
                other => {
                    warn!(trip_id = %row.trip_id, change = %other, "skipping unknown signal change");
                    continue;
                }
            };
            let change = SignalChange {
                trip_id: TripId(row.trip_id),
                rider_id: RiderId(row.rider_id),
                stop_id: StopId(row.stop_id),
                kind,
            };
            if self.signals.send(change).is_err() {
                trace!(trip_id = %row.trip_id, "no signal change subscribers");
            }
            emitted += 1;
        }

        Ok(emitted)
    }
}

impl fmt::Debug for PostgresChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresChangeFeed")
            .field("pool_size", &self.pool.size())
            .field("config", &self.config)
            .field("trip_subscribers", &self.trips.receiver_count())
            .field("signal_subscribers", &self.signals.receiver_count())
            .finish()
    }
}

fn full_page_end(revisions: impl ExactSizeIterator<Item = i64>, limit: i64) -> Option<i64> {
    if (revisions.len() as i64) < limit {
        return None;
    }
    revisions.last()
}

async fn current_revision(pool: &PgPool) -> StoreResult<i64> {
    let revision = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT GREATEST(
            COALESCE((SELECT MAX(revision) FROM trips), 0),
            COALESCE((SELECT MAX(revision) FROM rider_signals), 0)
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(revision)
}
