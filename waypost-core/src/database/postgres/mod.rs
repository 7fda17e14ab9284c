//! PostgreSQL-backed stores.
//!
//! Writes go straight to the database. Change notification comes from
//! [`PostgresChangeFeed`], which polls the `revision` column shared by
//! `trips` and `rider_signals`, so every node sees every node's writes.

pub mod change_feed;
pub mod routes;
pub mod signals;
pub mod trips;

use std::fmt;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

pub use change_feed::{ChangeFeedConfig, PostgresChangeFeed};
pub use routes::PostgresRouteDirectory;
pub use signals::PostgresSignalStore;
pub use trips::PostgresTripStore;

use crate::error::{StoreError, StoreResult};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Unavailable(format!("migration failed: {err}")))?;
        info!("database migrations applied");
        Ok(())
    }
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}
