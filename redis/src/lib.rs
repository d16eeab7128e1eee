//! Redis adapters for herald.
//!
//! - [`RedisEphemeralStore`]: actor sets, active-status hashes, claim keys and
//!   the settings cache.
//! - [`RedisJobQueue`]: the delayed, leased job queue the worker drains.
//!
//! Both wrap a [`ConnectionManager`], which reconnects on its own and is
//! cheap to clone; pass one manager to both to share the connection.
//!
//! # Example
//!
//! ```no_run
//! use herald_redis::{connect, RedisEphemeralStore, RedisJobQueue};
//!
//! # async fn example() -> herald_core::Result<()> {
//! let manager = connect("redis://127.0.0.1:6379").await?;
//! let store = RedisEphemeralStore::from_manager(manager.clone());
//! let queue = RedisJobQueue::from_manager(manager);
//! # Ok(())
//! # }
//! ```

use herald_core::HeraldError;
use redis::aio::ConnectionManager;
use redis::Client;

mod queue;
mod store;

pub use queue::RedisJobQueue;
pub use store::RedisEphemeralStore;

/// Open a managed connection.
///
/// # Errors
///
/// Returns [`HeraldError::Cache`] if the URL is invalid or Redis is
/// unreachable.
pub async fn connect(redis_url: &str) -> herald_core::Result<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| HeraldError::Cache(format!("Failed to create Redis client: {e}")))?;

    ConnectionManager::new(client)
        .await
        .map_err(|e| HeraldError::Cache(format!("Failed to create Redis connection manager: {e}")))
}

pub(crate) fn redis_error(operation: &str, error: &redis::RedisError) -> HeraldError {
    if error.is_timeout() {
        HeraldError::Timeout {
            operation: format!("redis {operation}"),
        }
    } else {
        HeraldError::Cache(format!("Failed to {operation}: {error}"))
    }
}
