use std::sync::Arc;

use botica_core::{Config, SanitizedConfig, TaskQueue, TaskStore};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn TaskStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            config,
            store,
            queue,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn TaskStore {
        self.store.as_ref()
    }

    pub fn queue(&self) -> &dyn TaskQueue {
        self.queue.as_ref()
    }
}
