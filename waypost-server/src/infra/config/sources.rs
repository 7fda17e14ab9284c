//! Raw configuration inputs before they are merged.

use std::path::PathBuf;

use serde::Deserialize;
use waypost_core::WaitWindows;

/// Values read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub routes_path: Option<PathBuf>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub standard_wait_secs: Option<i64>,
    pub extended_wait_secs: Option<i64>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("WAYPOST_CONFIG").ok().map(PathBuf::from),
            server_host: std::env::var("WAYPOST_HOST").ok(),
            server_port: std::env::var("WAYPOST_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            database_max_connections: std::env::var("WAYPOST_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok()),
            routes_path: std::env::var("WAYPOST_ROUTES_PATH").ok().map(PathBuf::from),
            cors_allowed_origins: std::env::var("WAYPOST_CORS_ORIGINS")
                .ok()
                .map(|raw| split_list(&raw)),
            standard_wait_secs: std::env::var("WAYPOST_STANDARD_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            extended_wait_secs: std::env::var("WAYPOST_EXTENDED_WAIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shape of `waypost.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: FileServerConfig,
    pub database: FileDatabaseConfig,
    pub live: FileLiveConfig,
    pub windows: Option<WaitWindows>,
    pub routes: FileRoutesConfig,
    pub cors: FileCorsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileDatabaseConfig {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileLiveConfig {
    pub tick_ms: Option<u64>,
    pub coalesce_ms: Option<u64>,
    pub subscriber_buffer: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileRoutesConfig {
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileCorsConfig {
    pub allowed_origins: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_lists_are_trimmed() {
        assert_eq!(
            split_list(" http://a.test, ,http://b.test "),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
