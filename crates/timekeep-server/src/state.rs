//! Application state.

use std::sync::Arc;
use std::time::Instant;
use timekeep_core::cleanup::CleanupService;
use timekeep_core::timezone::{SystemTimeZoneResolver, TimeZoneResolver};
use timekeep_core::SessionRegistry;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Config,
    /// Session registry
    pub registry: Arc<SessionRegistry>,
    /// Timezone resolver, shared with the registry
    pub resolver: Arc<dyn TimeZoneResolver>,
    /// Background cleanup service
    pub cleanup: Arc<CleanupService>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Arc<Self> {
        let resolver: Arc<dyn TimeZoneResolver> = Arc::new(SystemTimeZoneResolver::new());
        let registry = Arc::new(SessionRegistry::new(Arc::clone(&resolver)));
        let cleanup = Arc::new(CleanupService::with_interval(
            Arc::clone(&registry),
            config.cleanup_interval,
        ));
        Arc::new(Self {
            config,
            registry,
            resolver,
            cleanup,
            start_time: Instant::now(),
        })
    }
}
