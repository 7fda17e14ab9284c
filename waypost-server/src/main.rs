//! # Waypost Server
//!
//! Coordinates shuttle trips between operators and riders.
//!
//! - **Trip lifecycle**: start, position, arrive, depart and end
//! - **Rider signals**: wait requests and absences
//! - **Stop status**: colors derived from dwell time and rider facts
//! - **Live view**: pushed updates over WebSocket

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypost_server::{
    infra::{
        config::{Config, ConfigLoad, ConfigLoader},
        startup,
    },
    routes,
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "waypost-server")]
#[command(about = "Trip coordination server for shuttle operators and riders")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to waypost.toml
    #[arg(long, env = "WAYPOST_CONFIG")]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply database migrations, import the route seed if configured, and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli.serve)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Migrate => run_migrate(&config).await,
    }
}

fn load_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    info!(
        windows.standard_secs = config.windows.standard_secs,
        windows.extended_secs = config.windows.extended_secs,
        live.tick_ms = config.live.tick_ms,
        live.coalesce_ms = config.live.coalesce_ms,
        storage = if config.uses_postgres() { "postgres" } else { "memory" },
        "configuration in effect"
    );

    Ok(Arc::new(config))
}

#[cfg(feature = "postgres")]
async fn run_migrate(config: &Config) -> anyhow::Result<()> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;
    startup::prepare_database(config, url).await?;
    info!("database is up to date");
    Ok(())
}

#[cfg(not(feature = "postgres"))]
async fn run_migrate(_config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("this build has no PostgreSQL support")
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;

    let runtime = startup::build_runtime(config).await?;
    let app = routes::create_app(runtime.state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "waypost server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    runtime.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
