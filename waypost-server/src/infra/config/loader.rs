use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use waypost_core::WaitWindows;

use super::models::{
    Config, ConfigMetadata, CorsConfig, DatabaseConfig, LiveSettings, RoutesConfig,
    ServerConfig,
};
use super::sources::{EnvConfig, FileConfig};
use super::validation::{ConfigWarnings, collect_warnings};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["waypost.toml", "config/waypost.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Use these values instead of reading the process environment.
    pub env: Option<EnvConfig>,
}

/// Merges environment, `waypost.toml` and defaults, in that order of
/// precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let env = self.options.env.clone().unwrap_or_else(EnvConfig::gather);
        let (file, config_path) = self.load_file_config(&env)?;
        let config_present = file.is_some();

        let config = compose(
            file.unwrap_or_default(),
            env,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;
        let warnings = collect_warnings(&config, config_present);

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file = read_file_config(&path)?;
        Ok((Some(file), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn compose(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<Config, ConfigLoadError> {
    let server_defaults = ServerConfig::default();
    let server = ServerConfig {
        host: env
            .server_host
            .or(file.server.host)
            .unwrap_or(server_defaults.host),
        port: env
            .server_port
            .or(file.server.port)
            .unwrap_or(server_defaults.port),
    };

    let database_defaults = DatabaseConfig::default();
    let url = env.database_url.or(file.database.url);
    if let Some(url) = &url
        && !(url.starts_with("postgres://") || url.starts_with("postgresql://"))
    {
        return Err(ConfigLoadError::InvalidDatabaseUrl {
            reason: "must start with postgres:// or postgresql://".into(),
        });
    }
    let database = DatabaseConfig {
        url,
        max_connections: env
            .database_max_connections
            .or(file.database.max_connections)
            .unwrap_or(database_defaults.max_connections)
            .max(1),
        poll_interval_ms: file
            .database
            .poll_interval_ms
            .unwrap_or(database_defaults.poll_interval_ms),
    };

    let live_defaults = LiveSettings::default();
    let live = LiveSettings {
        tick_ms: file.live.tick_ms.unwrap_or(live_defaults.tick_ms),
        coalesce_ms: file.live.coalesce_ms.unwrap_or(live_defaults.coalesce_ms),
        subscriber_buffer: file
            .live
            .subscriber_buffer
            .unwrap_or(live_defaults.subscriber_buffer),
    };
    if live.tick_ms == 0 {
        return Err(ConfigLoadError::InvalidLive {
            reason: "tick_ms must be positive".into(),
        });
    }
    if live.subscriber_buffer < 2 {
        return Err(ConfigLoadError::InvalidLive {
            reason: "subscriber_buffer must hold at least two messages".into(),
        });
    }

    let file_windows = file.windows.unwrap_or_default();
    let windows = WaitWindows::new(
        env.standard_wait_secs.unwrap_or(file_windows.standard_secs),
        env.extended_wait_secs.unwrap_or(file_windows.extended_secs),
    );
    if !windows.is_valid() {
        return Err(ConfigLoadError::InvalidWindows {
            standard_secs: windows.standard_secs,
            extended_secs: windows.extended_secs,
        });
    }

    let routes = RoutesConfig {
        seed_path: env.routes_path.or(file.routes.seed_path),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .or(file.cors.allowed_origins)
            .unwrap_or_default(),
    };

    Ok(Config {
        server,
        database,
        live,
        windows,
        routes,
        cors,
        metadata,
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid database URL: {reason}")]
    InvalidDatabaseUrl { reason: String },
    #[error(
        "invalid wait windows: extended ({extended_secs}s) must be at least standard ({standard_secs}s) and neither negative"
    )]
    InvalidWindows {
        standard_secs: i64,
        extended_secs: i64,
    },
    #[error("invalid live settings: {reason}")]
    InvalidLive { reason: String },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn loader_for(dir: &TempDir, env: EnvConfig) -> ConfigLoader {
        ConfigLoader::new()
            .with_env_file(dir.path().join("absent.env"))
            .with_env(env)
    }

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn file_values_fill_in_under_env_overrides() {
        let dir = TempDir::new().expect("temp dir");
        let file = toml_file(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [live]
            tick_ms = 500

            [windows]
            standard_secs = 240
            extended_secs = 360

            [cors]
            allowed_origins = ["https://ops.example"]
            "#,
        );
        let env = EnvConfig {
            server_port: Some(7000),
            extended_wait_secs: Some(400),
            ..EnvConfig::default()
        };

        let load = loader_for(&dir, env)
            .with_config_path(file.path())
            .load()
            .expect("config loads");
        let config = load.config;

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.live.tick_ms, 500);
        assert_eq!(config.windows, WaitWindows::new(240, 400));
        assert_eq!(config.cors.allowed_origins, vec!["https://ops.example"]);
        assert_eq!(config.metadata.config_path.as_deref(), Some(file.path()));
        assert!(!config.metadata.env_file_loaded);
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = TempDir::new().expect("temp dir");
        let load = loader_for(&dir, EnvConfig::default())
            .load()
            .expect("config loads");

        assert!(load.config.metadata.config_path.is_none());
        assert_eq!(load.config.server.port, 8080);
        assert_eq!(load.config.windows, WaitWindows::default());
        assert!(!load.config.uses_postgres());
        assert!(!load.warnings.is_empty());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let err = loader_for(&dir, EnvConfig::default())
            .with_config_path(dir.path().join("nope.toml"))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn inverted_windows_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let file = toml_file("[windows]\nstandard_secs = 500\nextended_secs = 400\n");
        let err = loader_for(&dir, EnvConfig::default())
            .with_config_path(file.path())
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidWindows {
                standard_secs: 500,
                extended_secs: 400
            }
        ));
    }

    #[test]
    fn non_postgres_urls_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let env = EnvConfig {
            database_url: Some("mysql://localhost/waypost".into()),
            ..EnvConfig::default()
        };
        let file = toml_file("");
        let err = loader_for(&dir, env)
            .with_config_path(file.path())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::InvalidDatabaseUrl { .. }));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let dir = TempDir::new().expect("temp dir");
        let file = toml_file("[server]\nhostname = \"oops\"\n");
        let err = loader_for(&dir, EnvConfig::default())
            .with_config_path(file.path())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }
}
