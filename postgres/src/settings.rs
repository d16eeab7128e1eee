//! Per-guild settings.

use crate::db_error;
use herald_core::model::SettingKey;
use herald_core::providers::ConfigurationStore;
use herald_core::Result;
use sqlx::PgPool;

/// `PostgreSQL` configuration store keyed by `(guild, property)`.
#[derive(Clone)]
pub struct PostgresConfigurationStore {
    pool: PgPool,
}

impl PostgresConfigurationStore {
    /// Create a configuration store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ConfigurationStore for PostgresConfigurationStore {
    async fn get(&self, guild_id: &str, key: SettingKey) -> Result<Option<String>> {
        let value: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM configuration WHERE guild_id = $1 AND property = $2",
        )
        .bind(guild_id)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("read setting", &e))?;

        Ok(value.map(|(value,)| value))
    }

    async fn set(&self, guild_id: &str, key: SettingKey, value: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO configuration (guild_id, property, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (guild_id, property)
            DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            ",
        )
        .bind(guild_id)
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("write setting", &e))?;

        tracing::info!(guild_id, property = key.as_str(), "Setting updated");
        Ok(())
    }
}
