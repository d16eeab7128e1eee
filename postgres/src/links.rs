//! Source messages and their starboard links.

use crate::db_error;
use herald_core::model::{LinkOutcome, LinkRecord, SourceEntity};
use herald_core::providers::LinkStore;
use herald_core::{HeraldError, Result};
use sqlx::PgPool;

/// `PostgreSQL` link store.
///
/// `insert_link` relies on the primary key of `starboard_links`: a losing
/// insert does nothing and the winner's row is read back.
#[derive(Clone)]
pub struct PostgresLinkStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    message_id: String,
    guild_id: String,
    channel_id: String,
    thread_id: Option<String>,
    author_id: String,
}

impl From<SourceRow> for SourceEntity {
    fn from(row: SourceRow) -> Self {
        Self {
            id: row.message_id,
            owner_id: row.author_id,
            location_id: row.channel_id,
            thread_id: row.thread_id,
            guild_id: row.guild_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    source_id: String,
    guild_id: String,
    channel_id: String,
    thread_id: Option<String>,
    author_id: String,
    starboard_channel_id: String,
    starboard_message_id: String,
}

impl From<LinkRow> for LinkRecord {
    fn from(row: LinkRow) -> Self {
        Self {
            source_id: row.source_id,
            guild_id: row.guild_id,
            location_id: row.channel_id,
            thread_id: row.thread_id,
            owner_id: row.author_id,
            representation_location_id: row.starboard_channel_id,
            representation_id: row.starboard_message_id,
        }
    }
}

impl PostgresLinkStore {
    /// Create a link store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LinkStore for PostgresLinkStore {
    async fn record_source(&self, source: &SourceEntity) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO tracked_messages (message_id, guild_id, channel_id, thread_id, author_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (message_id) DO NOTHING
            ",
        )
        .bind(&source.id)
        .bind(&source.guild_id)
        .bind(&source.location_id)
        .bind(&source.thread_id)
        .bind(&source.owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("record source message", &e))?;
        Ok(())
    }

    async fn source(&self, source_id: &str) -> Result<Option<SourceEntity>> {
        let row: Option<SourceRow> = sqlx::query_as(
            r"
            SELECT message_id, guild_id, channel_id, thread_id, author_id
            FROM tracked_messages
            WHERE message_id = $1
            ",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load source message", &e))?;

        Ok(row.map(SourceEntity::from))
    }

    async fn insert_link(&self, link: &LinkRecord) -> Result<LinkOutcome> {
        let inserted: Option<(String,)> = sqlx::query_as(
            r"
            INSERT INTO starboard_links
                (source_id, guild_id, channel_id, thread_id, author_id,
                 starboard_channel_id, starboard_message_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id) DO NOTHING
            RETURNING source_id
            ",
        )
        .bind(&link.source_id)
        .bind(&link.guild_id)
        .bind(&link.location_id)
        .bind(&link.thread_id)
        .bind(&link.owner_id)
        .bind(&link.representation_location_id)
        .bind(&link.representation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("insert starboard link", &e))?;

        if inserted.is_some() {
            return Ok(LinkOutcome::Inserted(link.clone()));
        }

        tracing::debug!(source_id = %link.source_id, "Starboard link already present, reading winner");
        match self.link(&link.source_id).await? {
            Some(existing) => Ok(LinkOutcome::Existing(existing)),
            None => Err(HeraldError::Conflict(format!(
                "starboard link for {} conflicted but is gone",
                link.source_id
            ))),
        }
    }

    async fn link(&self, source_id: &str) -> Result<Option<LinkRecord>> {
        let row: Option<LinkRow> = sqlx::query_as(
            r"
            SELECT source_id, guild_id, channel_id, thread_id, author_id,
                   starboard_channel_id, starboard_message_id
            FROM starboard_links
            WHERE source_id = $1
            ",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load starboard link", &e))?;

        Ok(row.map(LinkRecord::from))
    }
}
