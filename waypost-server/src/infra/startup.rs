//! Wiring of stores, coordinator and live publisher from a [`Config`].

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use waypost_core::database::memory::StaticRouteDirectory;
use waypost_core::{Clock, LivePublisher, SystemClock, TripCoordinator, TripStores};

use crate::infra::app_state::AppState;
use crate::infra::config::Config;

/// Application state plus the background tasks it depends on.
#[derive(Debug)]
pub struct Runtime {
    pub state: AppState,
    pub background: Vec<JoinHandle<()>>,
    pub shutdown: CancellationToken,
}

impl Runtime {
    /// Stop live feeds and background tasks and wait for them to finish.
    pub async fn shutdown(self) {
        self.state.live().shutdown();
        self.shutdown.cancel();
        for handle in self.background {
            if let Err(err) = handle.await {
                warn!(error = %err, "background task ended abnormally");
            }
        }
    }
}

pub fn load_route_seed(config: &Config) -> anyhow::Result<StaticRouteDirectory> {
    match &config.routes.seed_path {
        Some(path) => {
            let routes = StaticRouteDirectory::load(path)
                .with_context(|| format!("failed to load route seed {}", path.display()))?;
            info!(
                path = %path.display(),
                carriers = routes.carriers().count(),
                riders = routes.riders().count(),
                "route seed loaded"
            );
            Ok(routes)
        }
        None => Ok(StaticRouteDirectory::new()),
    }
}

/// State backed by in-memory stores.
pub fn in_memory_state(
    config: Arc<Config>,
    routes: StaticRouteDirectory,
    clock: Arc<dyn Clock>,
) -> AppState {
    assemble(config, TripStores::in_memory(routes), clock)
}

fn assemble(config: Arc<Config>, stores: TripStores, clock: Arc<dyn Clock>) -> AppState {
    let coordinator = TripCoordinator::new(stores, clock).with_windows(config.windows);
    let live = LivePublisher::new(coordinator.clone(), config.live_config());
    AppState::new(coordinator, live, config)
}

/// Build the runtime described by `config`: PostgreSQL when a database URL
/// is configured, in-memory stores otherwise.
pub async fn build_runtime(config: Arc<Config>) -> anyhow::Result<Runtime> {
    let shutdown = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    match config.database.url.clone() {
        Some(url) => connect_postgres(config, &url, clock, shutdown).await,
        None => {
            info!("running with in-memory stores");
            let routes = load_route_seed(&config)?;
            Ok(Runtime {
                state: in_memory_state(config, routes, clock),
                background: Vec::new(),
                shutdown,
            })
        }
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(
    config: Arc<Config>,
    url: &str,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) -> anyhow::Result<Runtime> {
    use std::time::Duration;
    use waypost_core::database::postgres::{ChangeFeedConfig, PostgresChangeFeed};

    let db = prepare_database(&config, url).await?;

    let feed_config = ChangeFeedConfig {
        poll_interval: Duration::from_millis(config.database.poll_interval_ms.max(10)),
        ..ChangeFeedConfig::default()
    };
    let feed = PostgresChangeFeed::new(&db, feed_config);
    let stores = TripStores::postgres(&db, &feed);
    let feed_task = feed.spawn(shutdown.child_token());
    info!("PostgreSQL change feed started");

    Ok(Runtime {
        state: assemble(config, stores, clock),
        background: vec![feed_task],
        shutdown,
    })
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(
    _config: Arc<Config>,
    _url: &str,
    _clock: Arc<dyn Clock>,
    _shutdown: CancellationToken,
) -> anyhow::Result<Runtime> {
    anyhow::bail!("DATABASE_URL is set but this build has no PostgreSQL support")
}

/// Connect, apply migrations and import the route seed if one is
/// configured.
#[cfg(feature = "postgres")]
pub async fn prepare_database(
    config: &Config,
    url: &str,
) -> anyhow::Result<waypost_core::database::postgres::PostgresDatabase> {
    use waypost_core::database::postgres::{PostgresDatabase, PostgresRouteDirectory};

    let db = PostgresDatabase::connect(url, config.database.max_connections)
        .await
        .context("failed to connect to PostgreSQL")?;
    info!(max_connections = config.database.max_connections, "connected to PostgreSQL");

    db.migrate().await.context("database migration failed")?;
    info!("database migrations applied");

    if config.routes.seed_path.is_some() {
        let routes = load_route_seed(config)?;
        PostgresRouteDirectory::new(db.pool().clone())
            .import(&routes)
            .await
            .context("failed to import route seed")?;
        info!("route seed imported");
    }

    Ok(db)
}
