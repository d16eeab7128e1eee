//! In-memory provider implementations.
//!
//! Every mock keeps its state behind `Arc<Mutex<..>>`, so clones share state
//! and a test can inspect what the engine did through its own handle.

mod config;
mod ephemeral;
mod follows;
mod links;
mod messaging;
mod queue;
mod status;

pub use config::MockConfigurationStore;
pub use ephemeral::InMemoryEphemeralStore;
pub use follows::InMemoryFollowRegistry;
pub use links::InMemoryLinkStore;
pub use messaging::{MockMessagingClient, SentMessage};
pub use queue::InMemoryJobQueue;
pub use status::MockStatusApi;

use herald_core::{HeraldError, Result};
use std::sync::{Mutex, MutexGuard};

/// Lock a mock's state, mapping poisoning to an internal error.
fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| HeraldError::Internal("Mutex lock failed".to_string()))
}
