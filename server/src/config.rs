//! Configuration management for the herald service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Only credentials and the database URL are required; unparsable numbers
//! fall back to their defaults.

use herald_clients::HttpClientConfig;
use herald_engine::EngineConfig;
use herald_runtime::{RetryPolicy, WorkerConfig};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` configuration
    pub postgres: PostgresConfig,
    /// Redis configuration (cache and job queue)
    pub redis: RedisConfig,
    /// Discord bot credentials
    pub discord: DiscordConfig,
    /// Twitch application credentials
    pub twitch: TwitchConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Reconciliation settings
    pub engine: EngineSettings,
    /// Job worker settings
    pub worker: WorkerSettings,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
}

/// Discord configuration
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token
    pub token: String,
}

/// Twitch configuration
#[derive(Clone)]
pub struct TwitchConfig {
    /// Application client id
    pub client_id: String,
    /// Application client secret
    pub client_secret: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Timeout applied to outbound HTTP requests
    pub http_timeout: Duration,
}

/// Reconciliation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Interval between liveness polls
    pub poll_interval: Duration,
    /// Delay before an announcement is re-polled
    pub repoll_delay: Duration,
    /// Threshold used when a tenant has none
    pub default_threshold: usize,
    /// Delay before a reaction's reconcile job runs
    pub debounce: Duration,
    /// TTL of cached tenant settings
    pub settings_cache_ttl: Duration,
}

/// Job worker settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Maximum jobs running at once
    pub concurrency: usize,
    /// Sleep between queue polls
    pub poll_interval: Duration,
    /// Upper bound on one job execution
    pub job_timeout: Duration,
    /// Attempts before a job is dead-lettered
    pub max_attempts: u32,
    /// Lease of a dequeued job
    pub lease: Duration,
    /// Dead letter queue capacity
    pub dlq_max_size: usize,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig").field("token", &"<redacted>").finish()
    }
}

impl std::fmt::Debug for TwitchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if a required variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if a required variable is unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        Ok(Self {
            postgres: PostgresConfig {
                url: vars.required("DATABASE_URL")?,
                max_connections: vars.parsed("DATABASE_MAX_CONNECTIONS", 10),
            },
            redis: RedisConfig {
                url: vars.get("REDIS_URL").unwrap_or_else(|| redis_url(&vars)),
            },
            discord: DiscordConfig {
                token: vars.required("DISCORD_TOKEN")?,
            },
            twitch: TwitchConfig {
                client_id: vars.required("TWITCH_CLIENT")?,
                client_secret: vars.required("TWITCH_SECRET")?,
            },
            server: ServerConfig {
                host: vars.get("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: vars.parsed("HTTP_PORT", 8080),
                http_timeout: vars.secs("HTTP_TIMEOUT_SECS", 10),
            },
            engine: EngineSettings {
                poll_interval: vars.secs("POLL_INTERVAL_SECS", 60),
                repoll_delay: vars.secs("REPOLL_DELAY_SECS", 300),
                default_threshold: vars.parsed("STARBOARD_DEFAULT_THRESHOLD", 3),
                debounce: vars.secs("STARBOARD_DEBOUNCE_SECS", 0),
                settings_cache_ttl: vars.secs("SETTINGS_CACHE_TTL_SECS", 60),
            },
            worker: WorkerSettings {
                concurrency: vars.parsed("WORKER_CONCURRENCY", 16),
                poll_interval: Duration::from_millis(vars.parsed("WORKER_POLL_INTERVAL_MS", 500)),
                job_timeout: vars.secs("JOB_TIMEOUT_SECS", 30),
                max_attempts: vars.parsed("JOB_MAX_ATTEMPTS", 5),
                lease: vars.secs("JOB_LEASE_SECS", 120),
                dlq_max_size: vars.parsed("DLQ_MAX_SIZE", 1000),
            },
        })
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Outbound HTTP client settings.
    #[must_use]
    pub fn http_client(&self) -> HttpClientConfig {
        HttpClientConfig::default().with_timeout(self.server.http_timeout)
    }

    /// Engine configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_default_threshold(self.engine.default_threshold)
            .with_debounce(self.engine.debounce)
            .with_settings_cache_ttl(self.engine.settings_cache_ttl)
            .with_poll_interval(self.engine.poll_interval)
            .with_repoll_delay(self.engine.repoll_delay)
    }

    /// Worker configuration.
    #[must_use]
    pub fn worker_config(&self) -> WorkerConfig {
        let retry = RetryPolicy::builder()
            .max_attempts(self.worker.max_attempts)
            .build();

        WorkerConfig::default()
            .with_concurrency(self.worker.concurrency)
            .with_poll_interval(self.worker.poll_interval)
            .with_job_timeout(self.worker.job_timeout)
            .with_lease(self.worker.lease)
            .with_retry_policy(retry)
            .with_dlq_max_size(self.worker.dlq_max_size)
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str, default: T) -> T {
        self.get(name)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    fn secs(&self, name: &str, default: u64) -> Duration {
        Duration::from_secs(self.parsed(name, default))
    }
}

fn redis_url<F: Fn(&str) -> Option<String>>(vars: &Vars<'_, F>) -> String {
    let host = vars.get("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = vars.parsed("REDIS_PORT", 6379);
    let db: u32 = vars.parsed("REDIS_DB", 0);

    let auth = match (vars.get("REDIS_USERNAME"), vars.get("REDIS_PASSWORD")) {
        (Some(user), Some(password)) => format!("{user}:{password}@"),
        (None, Some(password)) => format!(":{password}@"),
        (Some(user), None) => format!("{user}@"),
        (None, None) => String::new(),
    };
    format!("redis://{auth}{host}:{port}/{db}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("DATABASE_URL", "postgres://localhost/herald"),
        ("DISCORD_TOKEN", "token"),
        ("TWITCH_CLIENT", "client"),
        ("TWITCH_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.postgres.max_connections, 10);
        assert_eq!(config.redis.url, "redis://127.0.0.1:6379/0");
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.engine.poll_interval, Duration::from_secs(60));
        assert_eq!(config.engine.repoll_delay, Duration::from_secs(300));
        assert_eq!(config.engine.default_threshold, 3);
        assert_eq!(config.engine.debounce, Duration::ZERO);
        assert_eq!(config.worker.concurrency, 16);
        assert_eq!(config.worker.poll_interval, Duration::from_millis(500));
        assert_eq!(config.worker.max_attempts, 5);
        assert_eq!(config.worker.dlq_max_size, 1000);
    }

    #[test]
    fn missing_credentials_are_reported() {
        let err = load(&REQUIRED[..3]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TWITCH_SECRET"));

        let mut blank = REQUIRED.to_vec();
        blank[1] = ("DISCORD_TOKEN", "  ");
        assert_eq!(load(&blank).unwrap_err(), ConfigError::Missing("DISCORD_TOKEN"));
    }

    #[test]
    fn redis_url_is_assembled_from_parts() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("REDIS_HOST", "cache"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "2"),
            ("REDIS_PASSWORD", "hunter2"),
        ]);
        assert_eq!(load(&pairs).unwrap().redis.url, "redis://:hunter2@cache:6380/2");

        pairs.push(("REDIS_URL", "redis://elsewhere:1/0"));
        assert_eq!(load(&pairs).unwrap().redis.url, "redis://elsewhere:1/0");
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("HTTP_PORT", "eighty"), ("STARBOARD_DEBOUNCE_SECS", "5")]);
        let config = load(&pairs).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine_config().debounce, Duration::from_secs(5));
    }

    #[test]
    fn secrets_are_not_logged() {
        let config = load(&REQUIRED).unwrap();
        let printed = format!("{:?}", config.twitch);
        assert!(!printed.contains("\"secret\""));
        assert!(printed.contains("<redacted>"));
    }
}
