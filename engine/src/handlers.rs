//! Job handler registration.
//!
//! Each handler captures a clone of the environment and forwards the typed
//! payload to [`EngineEnvironment::handle`].

use crate::environment::EngineEnvironment;
use herald_core::environment::Clock;
use herald_core::job::{JobName, JobPayload};
use herald_core::providers::{
    ConfigurationStore, EphemeralStore, FollowRegistry, JobQueue, LinkStore, MessagingClient,
    StatusApi,
};
use herald_core::Result;
use herald_runtime::HandlerRegistry;

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
    /// Run the operation behind a job payload.
    ///
    /// # Errors
    ///
    /// Returns the operation's error; the worker classifies it.
    pub async fn handle(&self, payload: JobPayload) -> Result<()> {
        match payload {
            JobPayload::Starboard { message_id } => self.reconcile(&message_id).await,
            JobPayload::UpdateStream { stream } => self.update_stream(&stream).await,
            JobPayload::RefreshStream { key } => self.refresh_stream(&key).await,
            JobPayload::RemoveStream { user } => self.remove_stream(&user).await,
        }
    }
}

/// Register a handler for every job name.
pub fn register_handlers<M, S, C, L, F, E, Q, K>(
    registry: &mut HandlerRegistry,
    env: &EngineEnvironment<M, S, C, L, F, E, Q, K>,
) where
    M: MessagingClient + Clone + 'static,
    S: StatusApi + Clone + 'static,
    C: ConfigurationStore + Clone + 'static,
    L: LinkStore + Clone + 'static,
    F: FollowRegistry + Clone + 'static,
    E: EphemeralStore + Clone + 'static,
    Q: JobQueue + Clone + 'static,
    K: Clock + Clone + 'static,
{
    for name in JobName::ALL {
        let env = env.clone();
        registry.register(name, move |payload| {
            let env = env.clone();
            async move { env.handle(payload).await }
        });
    }
}
