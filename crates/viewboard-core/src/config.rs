use std::time::Duration;

use crate::store::{Catalog, FilterDefaults};

#[derive(Debug, Clone)]
pub struct Config {
    /// Full URL of the analytics endpoint, e.g. `http://localhost:3000/api/analytics`.
    pub analytics_url: String,
    pub stale_time_ms: u64,
    /// How long a failed fetch is served as an error before a read refetches.
    pub error_stale_time_ms: u64,
    pub gc_time_ms: u64,
    pub gc_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Retry 4xx responses too. Off by default: a malformed filter will not
    /// succeed on a second attempt.
    pub retry_client_errors: bool,
    /// Use the response's `Cache-Control` max-age as the staleness threshold.
    pub honor_cache_control: bool,
    pub defaults: FilterDefaults,
}

/// Exponential backoff schedule for failed fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt_index` (0 for the first retry):
    /// `min(base * 2^attempt_index, max)`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt_index).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analytics_url: "http://localhost:3000/api/analytics".to_string(),
            stale_time_ms: 5 * 60 * 1000,
            error_stale_time_ms: 30_000,
            gc_time_ms: 10 * 60 * 1000,
            gc_interval_ms: 60 * 1000,
            request_timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            retry_client_errors: false,
            honor_cache_control: false,
            defaults: FilterDefaults::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Missing variables
    /// fall back to [`Config::default`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let number = |name: &str, default: u64| -> Result<u64, String> {
            match lookup(name) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid {name}: {e}")),
                None => Ok(default),
            }
        };
        let flag = |name: &str, default: bool| {
            lookup(name)
                .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
                .unwrap_or(default)
        };
        let list = |name: &str, default: &[String]| {
            lookup(name)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_else(|| default.to_vec())
        };

        let max_attempts = number(
            "VIEWBOARD_RETRY_MAX_ATTEMPTS",
            u64::from(base.retry.max_attempts),
        )?;
        let retry = RetryPolicy {
            max_attempts: u32::try_from(max_attempts)
                .map_err(|_| "VIEWBOARD_RETRY_MAX_ATTEMPTS out of range".to_string())?
                .max(1),
            base_delay_ms: number("VIEWBOARD_RETRY_BASE_DELAY_MS", base.retry.base_delay_ms)?,
            max_delay_ms: number("VIEWBOARD_RETRY_MAX_DELAY_MS", base.retry.max_delay_ms)?,
        };

        let defaults = FilterDefaults {
            brands: list("VIEWBOARD_DEFAULT_BRANDS", &base.defaults.brands),
            products: list("VIEWBOARD_DEFAULT_PRODUCTS", &base.defaults.products),
            initial_month: lookup("VIEWBOARD_INITIAL_MONTH")
                .unwrap_or(base.defaults.initial_month),
            catalog: Catalog {
                brands: list("VIEWBOARD_BRANDS", &base.defaults.catalog.brands),
                products: list("VIEWBOARD_PRODUCTS", &base.defaults.catalog.products),
            },
        };

        Ok(Self {
            analytics_url: lookup("VIEWBOARD_ANALYTICS_URL").unwrap_or(base.analytics_url),
            stale_time_ms: number("VIEWBOARD_STALE_TIME_MS", base.stale_time_ms)?,
            error_stale_time_ms: number(
                "VIEWBOARD_ERROR_STALE_TIME_MS",
                base.error_stale_time_ms,
            )?,
            gc_time_ms: number("VIEWBOARD_GC_TIME_MS", base.gc_time_ms)?,
            gc_interval_ms: number("VIEWBOARD_GC_INTERVAL_MS", base.gc_interval_ms)?,
            request_timeout_ms: number("VIEWBOARD_REQUEST_TIMEOUT_MS", base.request_timeout_ms)?,
            retry,
            retry_client_errors: flag("VIEWBOARD_RETRY_CLIENT_ERRORS", base.retry_client_errors),
            honor_cache_control: flag("VIEWBOARD_HONOR_CACHE_CONTROL", base.honor_cache_control),
            defaults,
        })
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn error_stale_time(&self) -> Duration {
        Duration::from_millis(self.error_stale_time_ms)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_millis(self.gc_time_ms)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(16_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(30_000));
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = Config::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(cfg.stale_time(), Duration::from_secs(300));
        assert_eq!(cfg.gc_time(), Duration::from_secs(600));
        assert_eq!(cfg.error_stale_time(), Duration::from_secs(30));
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert!(!cfg.retry_client_errors);
        assert_eq!(cfg.defaults.brands, vec!["Koenig".to_string()]);
        assert_eq!(cfg.defaults.products, vec!["Airfryer".to_string()]);
        assert_eq!(cfg.defaults.initial_month, "July 2025");
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("VIEWBOARD_ANALYTICS_URL", "http://127.0.0.1:9000/analytics"),
            ("VIEWBOARD_STALE_TIME_MS", "1500"),
            ("VIEWBOARD_ERROR_STALE_TIME_MS", "250"),
            ("VIEWBOARD_RETRY_MAX_ATTEMPTS", "5"),
            ("VIEWBOARD_RETRY_CLIENT_ERRORS", "true"),
            ("VIEWBOARD_DEFAULT_BRANDS", "Koenig, Turmix,"),
            ("VIEWBOARD_DEFAULT_PRODUCTS", ""),
        ]))
        .expect("config");
        assert_eq!(cfg.analytics_url, "http://127.0.0.1:9000/analytics");
        assert_eq!(cfg.stale_time_ms, 1500);
        assert_eq!(cfg.error_stale_time_ms, 250);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert!(cfg.retry_client_errors);
        assert_eq!(
            cfg.defaults.brands,
            vec!["Koenig".to_string(), "Turmix".to_string()]
        );
        assert!(cfg.defaults.products.is_empty());
    }

    #[test]
    fn non_numeric_value_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("VIEWBOARD_GC_TIME_MS", "ten")]))
            .expect_err("invalid");
        assert!(err.contains("VIEWBOARD_GC_TIME_MS"));
    }
}
