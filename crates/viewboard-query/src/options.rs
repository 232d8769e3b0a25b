use std::time::Duration;

use viewboard_core::config::{Config, RetryPolicy};

/// Tuning for [`crate::cache::QueryCache`], injected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long a successful result is served without refetching.
    pub stale_time: Duration,
    /// How long a failed result is served before a read refetches it.
    pub error_stale_time: Duration,
    /// How long an entry with no subscribers survives before eviction.
    pub gc_time: Duration,
    pub retry: RetryPolicy,
    pub retry_client_errors: bool,
    /// Prefer the endpoint's `Cache-Control` max-age over `stale_time`.
    pub honor_cache_control: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for QueryOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            stale_time: cfg.stale_time(),
            error_stale_time: cfg.error_stale_time(),
            gc_time: cfg.gc_time(),
            retry: cfg.retry,
            retry_client_errors: cfg.retry_client_errors,
            honor_cache_control: cfg.honor_cache_control,
        }
    }
}
