//! Configuration for the proxy pool.

use std::time::Duration;

/// Strategy for selecting a proxy from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxySelectionStrategy {
    /// Select a random active proxy.
    #[default]
    Random,
    /// Select proxies in round-robin fashion, skipping inactive ones.
    RoundRobin,
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Consecutive failures after which a proxy is marked inactive.
    pub failure_threshold: u32,
    /// How long an inactive proxy must sit unused before the pool may reactivate it.
    pub reactivation_cooldown: Duration,
    /// Strategy for selecting proxies.
    pub selection_strategy: ProxySelectionStrategy,
    /// Whether adding a known `(host, port)` updates the existing record instead of appending.
    pub upsert_on_add: bool,
    /// Number of times the middleware retries a request with different proxies.
    pub retry_count: usize,
    /// Timeout applied to each request the middleware sends through a proxy.
    pub request_timeout: Duration,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    failure_threshold: Option<u32>,
    reactivation_cooldown: Option<Duration>,
    selection_strategy: Option<ProxySelectionStrategy>,
    upsert_on_add: Option<bool>,
    retry_count: Option<usize>,
    request_timeout: Option<Duration>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: None,
            reactivation_cooldown: None,
            selection_strategy: None,
            upsert_on_add: None,
            retry_count: None,
            request_timeout: None,
        }
    }

    /// Set the number of consecutive failures that deactivates a proxy.
    /// A threshold of zero is treated as one.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set the idle time after which an inactive proxy may be reactivated.
    pub fn reactivation_cooldown(mut self, cooldown: Duration) -> Self {
        self.reactivation_cooldown = Some(cooldown);
        self
    }

    /// Set the strategy for selecting proxies.
    pub fn selection_strategy(mut self, strategy: ProxySelectionStrategy) -> Self {
        self.selection_strategy = Some(strategy);
        self
    }

    /// Enable or disable upsert-by-key when adding proxies.
    pub fn upsert_on_add(mut self, upsert: bool) -> Self {
        self.upsert_on_add = Some(upsert);
        self
    }

    /// Set the number of times to retry a request with different proxies.
    pub fn retry_count(mut self, count: usize) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Set the per-request timeout used by the middleware.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            failure_threshold: self.failure_threshold.unwrap_or(3).max(1),
            reactivation_cooldown: self.reactivation_cooldown.unwrap_or(Duration::from_secs(300)),
            selection_strategy: self.selection_strategy.unwrap_or_default(),
            upsert_on_add: self.upsert_on_add.unwrap_or(true),
            retry_count: self.retry_count.unwrap_or(3),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(10)),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
