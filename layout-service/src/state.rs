//! Application state management

use std::sync::Arc;

use crate::{config::Config, health::HealthAggregator};

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<Config>,
    health: Arc<HealthAggregator>,
}

impl AppState {
    pub fn new(config: Config, health: HealthAggregator) -> Self {
        Self {
            config: Arc::new(config),
            health: Arc::new(health),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the health aggregator
    pub fn health(&self) -> &Arc<HealthAggregator> {
        &self.health
    }
}
