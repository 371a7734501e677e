//! Server configuration.

use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between background cleanup sweeps
    pub cleanup_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup_interval: timekeep_core::cleanup::CLEANUP_INTERVAL,
        }
    }
}

impl Config {
    /// Load configuration from the environment or defaults.
    ///
    /// `TIMEKEEP_CLEANUP_INTERVAL_SECS` overrides the sweep cadence.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Ok(secs) = std::env::var("TIMEKEEP_CLEANUP_INTERVAL_SECS") {
            if let Ok(secs) = secs.trim().parse::<u64>() {
                if secs > 0 {
                    config.cleanup_interval = Duration::from_secs(secs);
                }
            }
        }
        config
    }
}
