//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::entities::SqlStore;
use crate::gateway::ModelGateway;
use crate::limiter::RateLimiter;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Chats, messages and preferences.
    pub store: Arc<SqlStore>,
    /// Weekly quota, backed by the same database as `store`.
    pub limiter: RateLimiter<SqlStore>,
    /// Generation provider.
    pub gateway: Arc<dyn ModelGateway>,
}

impl AppState {
    pub fn new(config: Config, store: SqlStore, gateway: Arc<dyn ModelGateway>) -> Self {
        let store = Arc::new(store);
        let limiter = RateLimiter::new(Arc::clone(&store), config.weekly_message_limit);
        Self {
            config: Arc::new(config),
            store,
            limiter,
            gateway,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bind_address", &self.config.bind_address)
            .field("store", &self.store)
            .field("limit", &self.limiter.limit())
            .finish_non_exhaustive()
    }
}
