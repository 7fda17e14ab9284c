use super::models::Config;

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Non-fatal observations about a resolved configuration.
pub fn collect_warnings(config: &Config, config_present: bool) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if !config_present {
        warnings.push_with_hint(
            "No waypost.toml detected; using environment variables and defaults",
            "Create waypost.toml or set WAYPOST_CONFIG to point at one",
        );
    }

    if !config.uses_postgres() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; trips and signals are kept in memory only",
            "Set DATABASE_URL to persist state across restarts",
        );
        if config.routes.seed_path.is_none() {
            warnings.push_with_hint(
                "No route seed configured; the route directory is empty",
                "Set WAYPOST_ROUTES_PATH or [routes].seed_path",
            );
        }
    }

    if config.cors.allowed_origins.is_empty() {
        warnings.push("CORS allows any origin");
    }

    if config.live.tick_ms > 1_000 {
        warnings.push(format!(
            "live tick of {} ms is slower than once per second",
            config.live.tick_ms
        ));
    }

    warnings
}
