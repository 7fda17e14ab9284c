use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use waypost_core::{LivePublisher, TripCoordinator};

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    coordinator: TripCoordinator,
    live: LivePublisher,
    config: Arc<Config>,
    started_at: DateTime<Utc>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(coordinator: TripCoordinator, live: LivePublisher, config: Arc<Config>) -> Self {
        Self {
            coordinator,
            live,
            config,
            started_at: Utc::now(),
        }
    }

    pub fn coordinator(&self) -> &TripCoordinator {
        &self.coordinator
    }

    pub fn live(&self) -> &LivePublisher {
        &self.live
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
