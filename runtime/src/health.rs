//! Component health.
//!
//! Each dependency reports a [`HealthCheck`]; [`HealthReport`] folds them into
//! one status for the `/health` endpoint. A report is only as healthy as its
//! worst component.

use chrono::{DateTime, Utc};
use std::fmt;

/// Ordered from best to worst, so `max` picks the worse of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Serving, but something needs attention (dead letters piling up).
    Degraded,
    /// Not serving.
    Unhealthy,
}

impl HealthStatus {
    /// `true` for [`HealthStatus::Healthy`].
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// `true` for [`HealthStatus::Unhealthy`].
    #[must_use]
    pub const fn is_unhealthy(self) -> bool {
        matches!(self, Self::Unhealthy)
    }

    /// The worse of `self` and `other`.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    /// Lowercase label used in health responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One component's health.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Component name, e.g. `postgres`.
    pub component: String,
    /// Status at probe time.
    pub status: HealthStatus,
    /// Reason for a non-healthy status.
    pub message: Option<String>,
    /// Extra key/value detail, in insertion order.
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    fn with_status(component: impl Into<String>, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            component: component.into(),
            status,
            message,
            metadata: Vec::new(),
        }
    }

    /// A passing check.
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Healthy, None)
    }

    /// A degraded check with its reason.
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Degraded, Some(message.into()))
    }

    /// A failing check with its reason.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Unhealthy, Some(message.into()))
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Healthy when the ping succeeded, unhealthy with the error otherwise.
    #[must_use]
    pub fn from_ping<E: fmt::Display>(component: impl Into<String>, outcome: Result<(), E>) -> Self {
        match outcome {
            Ok(()) => Self::healthy(component),
            Err(e) => Self::unhealthy(component, e.to_string()),
        }
    }
}

/// Every check from one probe round, plus the overall status.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Worst status among `checks`; healthy when there are none.
    pub status: HealthStatus,
    /// Checks in probe order.
    pub checks: Vec<HealthCheck>,
    /// When the report was assembled.
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Fold `checks` into a report stamped now.
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        Self {
            status,
            checks,
            timestamp: Utc::now(),
        }
    }

    /// `true` when every check passed.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}
