//! # Herald Core
//!
//! Domain types, job contracts and provider traits for the herald
//! reconciliation engine.
//!
//! Herald watches two kinds of external signal and keeps exactly one
//! representation of each inside a messaging surface:
//!
//! - **Starboard**: a message collecting enough star reactions gets a pinned
//!   summary in the tenant's starboard channel.
//! - **Liveness**: a followed streamer going live gets an announcement that is
//!   refreshed while the stream runs and finalised when it ends.
//!
//! ## Core Concepts
//!
//! - **Providers**: every collaborator (messaging client, status API, stores,
//!   job queue) is a trait in [`providers`], injected by the engine.
//! - **Jobs**: deferred work travels as a [`job::Job`] envelope whose payload is
//!   validated into a [`job::JobPayload`] at the dequeue boundary.
//! - **Reducers**: pure transition functions `(State, Action) → Effects`;
//!   effects are values interpreted by the engine.
//! - **Errors**: a single [`HeraldError`] taxonomy with classifiers the worker
//!   uses to decide between retry, drop and dead-lettering.
//!
//! ## Example
//!
//! ```ignore
//! use herald_core::job::{JobName, JobPayload};
//!
//! let payload = JobPayload::Starboard { message_id: "1203".into() };
//! assert_eq!(payload.name(), JobName::Starboard);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

/// Error taxonomy shared by every crate
pub mod error;

/// Source entities, link records and status records
pub mod model;

/// Outbound message content (embeds, link buttons)
pub mod content;

/// Job envelope and typed payloads
pub mod job;

/// Provider traits for injected collaborators
pub mod providers;

pub use error::{HeraldError, Result};

/// Reducer module - pure transition functions
///
/// Reducers are pure functions: `(State, Action) → Effects`.
///
/// They hold the decision logic of each state machine and never perform I/O;
/// the engine reads the facts a reducer needs, feeds them in as actions, and
/// interprets the returned effects against its providers.
pub mod reducer {
    use smallvec::SmallVec;

    /// Effects returned by a single reduction.
    ///
    /// Most transitions emit zero, one or two effects, so they stay inline.
    pub type Effects<E> = SmallVec<[E; 4]>;

    /// The Reducer trait - core abstraction for transition logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The observations and outcomes this reducer processes
    /// - `Effect`: The effect descriptions it emits
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for PinReducer {
    ///     type State = PinState;
    ///     type Action = PinAction;
    ///     type Effect = PinEffect;
    ///
    ///     fn reduce(&self, state: &mut PinState, action: PinAction) -> Effects<PinEffect> {
    ///         match action {
    ///             PinAction::Observed { count, threshold } if count >= threshold => {
    ///                 smallvec![PinEffect::Create { count }]
    ///             }
    ///             _ => Effects::new(),
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The effect type this reducer emits
        type Effect;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Inspects the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Effects<Self::Effect>;
    }
}

/// Environment module - time abstraction
///
/// All external dependencies are abstracted behind traits and injected;
/// time is one of them so job scheduling stays deterministic in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
