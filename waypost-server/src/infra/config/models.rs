use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use waypost_core::{LiveConfig, WaitWindows};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub live: LiveSettings,
    pub windows: WaitWindows,
    pub routes: RoutesConfig,
    pub cors: CorsConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            tick: Duration::from_millis(self.live.tick_ms),
            coalesce: Duration::from_millis(self.live.coalesce_ms),
            subscriber_buffer: self.live.subscriber_buffer,
            ..LiveConfig::default()
        }
    }

    pub fn uses_postgres(&self) -> bool {
        self.database.url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// PostgreSQL settings. Without a URL the server keeps everything in
/// memory.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub poll_interval_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub tick_ms: u64,
    pub coalesce_ms: u64,
    pub subscriber_buffer: usize,
}

impl Default for LiveSettings {
    fn default() -> Self {
        let defaults = LiveConfig::default();
        Self {
            tick_ms: defaults.tick.as_millis() as u64,
            coalesce_ms: defaults.coalesce.as_millis() as u64,
            subscriber_buffer: defaults.subscriber_buffer,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutesConfig {
    /// TOML or JSON seed for the route directory.
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
