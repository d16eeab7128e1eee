//! Engine environment.
//!
//! This module defines the environment type for dependency injection: the
//! engine's operations are methods on [`EngineEnvironment`], and every
//! collaborator they touch is one of its fields.

use crate::config::EngineConfig;
use herald_core::environment::Clock;
use herald_core::providers::{
    ConfigurationStore, EphemeralStore, FollowRegistry, JobQueue, LinkStore, MessagingClient,
    StatusApi,
};
use herald_runtime::Scheduler;

/// Engine environment.
///
/// Clones share the underlying clients and stores (every provider is a
/// cheap handle), so handlers capture a clone per job.
///
/// # Type Parameters
///
/// - `M`: Messaging client
/// - `S`: Status API
/// - `C`: Configuration store
/// - `L`: Link store
/// - `F`: Follow registry
/// - `E`: Ephemeral store
/// - `Q`: Job queue
/// - `K`: Clock
#[derive(Clone)]
pub struct EngineEnvironment<M, S, C, L, F, E, Q, K>
where
    M: MessagingClient + Clone,
    S: StatusApi + Clone,
    C: ConfigurationStore + Clone,
    L: LinkStore + Clone,
    F: FollowRegistry + Clone,
    E: EphemeralStore + Clone,
    Q: JobQueue + Clone,
    K: Clock + Clone,
{
    /// Messaging surface client.
    pub messaging: M,

    /// Live status API (`Twitch` Helix).
    pub status: S,

    /// Tenant settings (`PostgreSQL`).
    pub settings: C,

    /// Source entities and link records (`PostgreSQL`).
    pub links: L,

    /// Follow registry (`PostgreSQL`).
    pub follows: F,

    /// Actor sets, status records, caches and claims (`Redis`).
    pub store: E,

    /// Job producer.
    pub scheduler: Scheduler<Q, K>,

    /// Tunables.
    pub config: EngineConfig,
}

impl<M, S, C, L, F, E, Q, K> EngineEnvironment<M, S, C, L, F, E, Q, K>
where
    M: MessagingClient + Clone,
    S: StatusApi + Clone,
    C: ConfigurationStore + Clone,
    L: LinkStore + Clone,
    F: FollowRegistry + Clone,
    E: EphemeralStore + Clone,
    Q: JobQueue + Clone,
    K: Clock + Clone,
{
    /// Create a new engine environment.
    #[must_use]
    #[allow(clippy::too_many_arguments)] // One field per injected collaborator
    pub const fn new(
        messaging: M,
        status: S,
        settings: C,
        links: L,
        follows: F,
        store: E,
        scheduler: Scheduler<Q, K>,
        config: EngineConfig,
    ) -> Self {
        Self {
            messaging,
            status,
            settings,
            links,
            follows,
            store,
            scheduler,
            config,
        }
    }
}
