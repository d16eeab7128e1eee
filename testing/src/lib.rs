//! # Herald Testing
//!
//! Testing utilities for herald.
//!
//! This crate provides:
//! - In-memory implementations of every provider trait ([`mocks`])
//! - Deterministic clocks
//! - Fixture builders for messages and stream statuses ([`fixtures`])
//!
//! ## Example
//!
//! ```ignore
//! use herald_testing::mocks::{InMemoryEphemeralStore, MockMessagingClient};
//!
//! #[tokio::test]
//! async fn pins_after_threshold() {
//!     let messaging = MockMessagingClient::new();
//!     messaging.add_channel("500", "starboard")?;
//!     // build an engine environment around the mocks ...
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use herald_core::environment::Clock;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory provider implementations
pub mod mocks;

/// Fixture builders
pub mod fixtures;

/// Given-When-Then reducer harness
pub mod reducer_test;

pub use reducer_test::{assertions, ReducerTest};

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use herald_testing::FixedClock;
/// use herald_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can advance the clock the engine
/// and worker hold.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Start at the given time.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 2025-01-01 00:00:00 UTC
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_089)
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(epoch())
}

/// Create a manual clock starting at 2025-01-01 00:00:00 UTC
#[must_use]
pub fn manual_clock() -> ManualClock {
    ManualClock::new(epoch())
}

/// Install a test subscriber once; later calls are no-ops.
///
/// Honors `RUST_LOG`, writes through the test harness's captured output.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = manual_clock();
        let held = clock.clone();
        clock.advance(Duration::minutes(5));
        assert_eq!(held.now(), epoch() + Duration::minutes(5));
    }
}
