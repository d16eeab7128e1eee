//! `PostgreSQL` stores for herald.
//!
//! Durable state lives here:
//!
//! - **Link store** (`tracked_messages`, `starboard_links`): source messages
//!   and their pins. `starboard_links.source_id` is the primary key, and that
//!   constraint is what keeps concurrent reconcile jobs from double-pinning.
//! - **Configuration** (`configuration`): per-guild settings.
//! - **Follow registry** (`twitch_follows`): which channels announce which
//!   streamers.
//!
//! All stores share one [`PgPool`] and are cheap to clone.
//!
//! # Example
//!
//! ```no_run
//! use herald_postgres::{connect, migrate, PostgresLinkStore};
//!
//! # async fn example() -> herald_core::Result<()> {
//! let pool = connect("postgres://localhost/herald", 10).await?;
//! migrate(&pool).await?;
//! let links = PostgresLinkStore::new(pool);
//! # Ok(())
//! # }
//! ```

use herald_core::HeraldError;
use sqlx::postgres::{PgPool, PgPoolOptions};

mod follows;
mod links;
mod settings;

pub use follows::PostgresFollowRegistry;
pub use links::PostgresLinkStore;
pub use settings::PostgresConfigurationStore;

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`HeraldError::Database`] if the database is unreachable.
pub async fn connect(database_url: &str, max_connections: u32) -> herald_core::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| db_error("connect", &e))
}

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns [`HeraldError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> herald_core::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| HeraldError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Round-trip check used by health reporting.
///
/// # Errors
///
/// Returns [`HeraldError::Database`] if the query fails.
pub async fn ping(pool: &PgPool) -> herald_core::Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| db_error("ping", &e))?;
    Ok(())
}

pub(crate) fn db_error(operation: &str, error: &sqlx::Error) -> HeraldError {
    match error {
        sqlx::Error::PoolTimedOut => HeraldError::Timeout {
            operation: format!("database {operation}"),
        },
        _ => HeraldError::Database(format!("Failed to {operation}: {error}")),
    }
}
