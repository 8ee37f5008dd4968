//! Sync engine configuration
//!
//! Polling bounds, debounce and paging defaults plus the controller address.

use std::time::Duration;

use crate::scheduler::BackoffPolicy;
use beacon_core::dto::pipeline::MAX_PAGE_SIZE;

/// Configuration shared by every view
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Controller base URL (e.g., "http://localhost:8080")
    pub controller_url: String,

    /// Polling interval right after a detected change
    pub min_refresh_interval: Duration,

    /// Upper bound the polling interval grows toward while nothing changes
    pub max_refresh_interval: Duration,

    /// Multiplier applied to the interval after each unchanged poll
    pub refresh_growth_factor: f64,

    /// Quiet period before a filter edit triggers a query
    pub filter_debounce: Duration,

    /// Default number of pipelines per page
    pub page_size: u32,

    /// Per-request timeout handed to the HTTP client
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with defaults for the given controller
    pub fn new(controller_url: impl Into<String>) -> Self {
        Self {
            controller_url: controller_url.into(),
            min_refresh_interval: Duration::from_secs(10),
            max_refresh_interval: Duration::from_secs(60),
            refresh_growth_factor: 1.5,
            filter_debounce: Duration::from_millis(300),
            page_size: 10,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables, all optional:
    /// - BEACON_CONTROLLER_URL (default: http://localhost:8080)
    /// - BEACON_REFRESH_MIN_SECS (default: 10)
    /// - BEACON_REFRESH_MAX_SECS (default: 60)
    /// - BEACON_REFRESH_GROWTH (default: 1.5)
    /// - BEACON_FILTER_DEBOUNCE_MS (default: 300)
    /// - BEACON_PAGE_SIZE (default: 10)
    /// - BEACON_REQUEST_TIMEOUT_SECS (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let controller_url =
            std::env::var("BEACON_CONTROLLER_URL").unwrap_or(defaults.controller_url);

        let min_refresh_interval = env_parse::<u64>("BEACON_REFRESH_MIN_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.min_refresh_interval);

        let max_refresh_interval = env_parse::<u64>("BEACON_REFRESH_MAX_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_refresh_interval);

        let refresh_growth_factor =
            env_parse::<f64>("BEACON_REFRESH_GROWTH").unwrap_or(defaults.refresh_growth_factor);

        let filter_debounce = env_parse::<u64>("BEACON_FILTER_DEBOUNCE_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.filter_debounce);

        let page_size = env_parse::<u32>("BEACON_PAGE_SIZE").unwrap_or(defaults.page_size);

        let request_timeout = env_parse::<u64>("BEACON_REQUEST_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let config = Self {
            controller_url,
            min_refresh_interval,
            max_refresh_interval,
            refresh_growth_factor,
            filter_debounce,
            page_size,
            request_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Overrides the controller URL
    pub fn with_controller_url(mut self, url: impl Into<String>) -> Self {
        self.controller_url = url.into();
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.controller_url.is_empty() {
            anyhow::bail!("controller_url cannot be empty");
        }

        if !self.controller_url.starts_with("http://")
            && !self.controller_url.starts_with("https://")
        {
            anyhow::bail!("controller_url must start with http:// or https://");
        }

        if self.min_refresh_interval.is_zero() {
            anyhow::bail!("min_refresh_interval must be greater than 0");
        }

        if self.min_refresh_interval > self.max_refresh_interval {
            anyhow::bail!("min_refresh_interval cannot exceed max_refresh_interval");
        }

        if !self.refresh_growth_factor.is_finite() || self.refresh_growth_factor < 1.0 {
            anyhow::bail!("refresh_growth_factor must be at least 1.0");
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            anyhow::bail!("page_size must be between 1 and {}", MAX_PAGE_SIZE);
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Polling policy derived from the refresh bounds
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.min_refresh_interval,
            self.max_refresh_interval,
            self.refresh_growth_factor,
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.min_refresh_interval, Duration::from_secs(10));
        assert_eq!(config.max_refresh_interval, Duration::from_secs(60));
        assert_eq!(config.refresh_growth_factor, 1.5);
        assert_eq!(config.filter_debounce, Duration::from_millis(300));
        assert_eq!(config.page_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.controller_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.controller_url = "https://controller.example".to_string();
        assert!(config.validate().is_ok());

        config.min_refresh_interval = Duration::from_secs(90);
        assert!(config.validate().is_err());
        config.min_refresh_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.min_refresh_interval = Duration::from_secs(10);

        config.refresh_growth_factor = 0.5;
        assert!(config.validate().is_err());
        config.refresh_growth_factor = 2.0;

        config.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());
        config.page_size = 25;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_policy_from_config() {
        let policy = SyncConfig::default().backoff_policy();
        assert_eq!(policy.min_interval, Duration::from_secs(10));
        assert_eq!(policy.max_interval, Duration::from_secs(60));
        assert_eq!(policy.growth_factor, 1.5);
    }

    #[test]
    fn test_with_controller_url() {
        let config = SyncConfig::default().with_controller_url("http://ctl:9000");
        assert_eq!(config.controller_url, "http://ctl:9000");
    }
}
