//! HTTP clients for herald's external collaborators.
//!
//! - [`DiscordClient`]: the messaging surface (REST v10, bot token)
//! - [`TwitchClient`]: the live status API (Helix, app access token)
//!
//! Both map HTTP outcomes onto [`HeraldError`] the same way:
//!
//! | outcome              | error                          |
//! |----------------------|--------------------------------|
//! | 404                  | `NotFound` (terminal)          |
//! | 429, 5xx             | `Api` (retryable)              |
//! | other 4xx            | `Api` (not retried)            |
//! | request timed out    | `Timeout` (retryable)          |
//! | connection failure   | `Transient` (retryable)        |

use herald_core::{HeraldError, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

mod discord;
mod twitch;

pub use discord::DiscordClient;
pub use twitch::{TwitchClient, TOKEN_KEY};

/// Settings shared by the HTTP clients.
#[derive(Debug, Clone, Copy)]
pub struct HttpClientConfig {
    /// Upper bound on a whole request.
    pub timeout: Duration,
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
}

impl HttpClientConfig {
    /// Create a configuration.
    #[must_use]
    pub const fn new(timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a `reqwest` client with these bounds.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] if the TLS backend cannot start.
    pub fn build(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HeraldError::Config(format!("Failed to build HTTP client: {e}")))
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(5))
    }
}

pub(crate) fn transport_error(operation: &str, error: &reqwest::Error) -> HeraldError {
    if error.is_timeout() {
        HeraldError::Timeout {
            operation: operation.to_string(),
        }
    } else if error.is_decode() {
        HeraldError::Serialization(format!("{operation}: {error}"))
    } else {
        HeraldError::Transient(format!("{operation}: {error}"))
    }
}

/// Pass successful responses through and classify the rest.
pub(crate) async fn check(response: Response, kind: &'static str, id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(HeraldError::not_found(kind, id));
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        tracing::warn!(status = status.as_u16(), kind, id, "Upstream asked us to back off");
    }
    Err(HeraldError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = HttpClientConfig::default().with_timeout(Duration::from_secs(3));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.build().is_ok());
    }
}
