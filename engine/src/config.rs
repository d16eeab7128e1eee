//! Engine configuration.

use std::time::Duration;

/// Tunables for both reconciliation paths.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reactions required before pinning when a tenant has no setting
    pub default_threshold: usize,
    /// Delay between a qualifying reaction and its `starboard` job
    pub debounce: Duration,
    /// Lifetime of cached tenant settings
    pub settings_cache_ttl: Duration,
    /// Lifetime of creation claim keys
    pub claim_ttl: Duration,
    /// Interval of the global liveness poll
    pub poll_interval: Duration,
    /// Delay of each chained `refresh-stream` job
    pub repoll_delay: Duration,
}

impl EngineConfig {
    /// Create a configuration with explicit values.
    #[must_use]
    pub const fn new(
        default_threshold: usize,
        debounce: Duration,
        settings_cache_ttl: Duration,
        claim_ttl: Duration,
        poll_interval: Duration,
        repoll_delay: Duration,
    ) -> Self {
        Self {
            default_threshold,
            debounce,
            settings_cache_ttl,
            claim_ttl,
            poll_interval,
            repoll_delay,
        }
    }

    /// Set the default threshold
    #[must_use]
    pub const fn with_default_threshold(mut self, threshold: usize) -> Self {
        self.default_threshold = threshold;
        self
    }

    /// Set the reaction debounce
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the settings cache lifetime
    #[must_use]
    pub const fn with_settings_cache_ttl(mut self, ttl: Duration) -> Self {
        self.settings_cache_ttl = ttl;
        self
    }

    /// Set the claim key lifetime
    #[must_use]
    pub const fn with_claim_ttl(mut self, ttl: Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }

    /// Set the global poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the re-poll delay
    #[must_use]
    pub const fn with_repoll_delay(mut self, delay: Duration) -> Self {
        self.repoll_delay = delay;
        self
    }

    /// Lifetime of a refresh chain marker: a few re-poll periods, so a
    /// marker outlives its job's retries but not an abandoned chain.
    #[must_use]
    pub fn chain_ttl(&self) -> Duration {
        self.repoll_delay.saturating_mul(3).max(Duration::from_secs(60))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_threshold: 3,
            debounce: Duration::ZERO,
            settings_cache_ttl: Duration::from_secs(60),
            claim_ttl: Duration::from_secs(30),
            poll_interval: Duration::from_secs(60),
            repoll_delay: Duration::from_secs(300),
        }
    }
}
