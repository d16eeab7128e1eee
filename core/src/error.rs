//! Error types for reconciliation, scheduling and store operations.

use thiserror::Error;

/// Result type alias for herald operations.
pub type Result<T> = std::result::Result<T, HeraldError>;

/// Error taxonomy for the reconciliation engine.
///
/// The worker never inspects messages; it routes on the classifiers below:
/// retryable errors go back to the queue with backoff, not-found errors end the
/// job after local cleanup, malformed jobs are dead-lettered without retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeraldError {
    // ═══════════════════════════════════════════════════════════
    // Downstream State
    // ═══════════════════════════════════════════════════════════

    /// Entity, channel or message is missing downstream.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up (e.g. "message", "channel")
        kind: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Unique-constraint violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    // ═══════════════════════════════════════════════════════════
    // Transport
    // ═══════════════════════════════════════════════════════════

    /// Network failure or temporary unavailability.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Bounded timeout elapsed.
    #[error("Timed out: {operation}")]
    Timeout {
        /// Operation that timed out
        operation: String,
    },

    /// Remote API answered with an error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Jobs
    // ═══════════════════════════════════════════════════════════

    /// Job payload does not match its schema.
    #[error("Malformed payload for job {job}: {reason}")]
    MalformedPayload {
        /// Job name
        job: String,
        /// Validation failure
        reason: String,
    },

    /// No handler registered for this job name.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// Durable store operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Ephemeral store operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal invariant failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HeraldError {
    /// Shorthand for [`HeraldError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for [`HeraldError::MalformedPayload`].
    pub fn malformed(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            job: job.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the scheduler should run the job again later.
    ///
    /// # Examples
    ///
    /// ```
    /// # use herald_core::HeraldError;
    /// assert!(HeraldError::Transient("reset".into()).is_retryable());
    /// assert!(!HeraldError::not_found("message", "1").is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::Timeout { .. } | Self::Cache(_) | Self::Database(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the downstream target no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for unique-constraint conflicts.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if the job itself is invalid and must never be retried.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. } | Self::UnknownJob(_))
    }

    /// Short label used as a metrics dimension.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Transient(_) => "transient",
            Self::Timeout { .. } => "timeout",
            Self::Api { .. } => "api",
            Self::MalformedPayload { .. } => "malformed",
            Self::UnknownJob(_) => "unknown_job",
            Self::Database(_) => "database",
            Self::Cache(_) => "cache",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for HeraldError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
