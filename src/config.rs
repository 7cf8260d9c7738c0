//! Configuration Module
//!
//! Handles loading the cache runtime configuration from environment variables.

use std::env;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker threads of the runtime driving expiration timers
    pub expiration_workers: usize,
    /// Thread name used by the expiration runtime
    pub expiration_thread_name: String,
    /// Base lifespan in milliseconds used by the demo binary
    pub demo_ttl_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `EXPIRATION_WORKERS` - Timer runtime worker threads (default: 1, minimum 1)
    /// - `EXPIRATION_THREAD_NAME` - Timer runtime thread name (default: ttl-cache-expiration)
    /// - `DEMO_TTL_MS` - Demo lifespan in milliseconds (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            expiration_workers: env::var("EXPIRATION_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.expiration_workers),
            expiration_thread_name: env::var("EXPIRATION_THREAD_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.expiration_thread_name),
            demo_ttl_ms: env::var("DEMO_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.demo_ttl_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expiration_workers: 1,
            expiration_thread_name: "ttl-cache-expiration".to_string(),
            demo_ttl_ms: 3000,
        }
    }
}
