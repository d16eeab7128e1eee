//! Channels following streamers.
//!
//! Logins are case-insensitive; they are stored lowercased so `subjects`
//! lines up with the keys of the active-status namespace.

use crate::db_error;
use herald_core::model::Follow;
use herald_core::providers::FollowRegistry;
use herald_core::Result;
use sqlx::types::Json;
use sqlx::PgPool;

/// `PostgreSQL` follow registry.
#[derive(Clone)]
pub struct PostgresFollowRegistry {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct FollowRow {
    guild_id: String,
    channel_id: String,
    streamer: String,
    mentions: Json<Vec<String>>,
}

impl From<FollowRow> for Follow {
    fn from(row: FollowRow) -> Self {
        Self {
            guild_id: row.guild_id,
            location_id: row.channel_id,
            subject: row.streamer,
            mentions: row.mentions.0,
        }
    }
}

impl PostgresFollowRegistry {
    /// Create a follow registry over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl FollowRegistry for PostgresFollowRegistry {
    async fn follow(&self, follow: &Follow) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO twitch_follows (guild_id, channel_id, streamer, mentions)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (channel_id, streamer)
            DO UPDATE SET guild_id = EXCLUDED.guild_id, mentions = EXCLUDED.mentions
            ",
        )
        .bind(&follow.guild_id)
        .bind(&follow.location_id)
        .bind(follow.subject.to_lowercase())
        .bind(Json(&follow.mentions))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("save follow", &e))?;
        Ok(())
    }

    async fn unfollow(&self, location_id: &str, subject: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM twitch_follows WHERE channel_id = $1 AND streamer = $2")
            .bind(location_id)
            .bind(subject.to_lowercase())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete follow", &e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn subjects(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT streamer FROM twitch_follows ORDER BY streamer")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("list followed streamers", &e))?;
        Ok(rows.into_iter().map(|(streamer,)| streamer).collect())
    }

    async fn targets(&self, subject: &str) -> Result<Vec<Follow>> {
        let rows: Vec<FollowRow> = sqlx::query_as(
            r"
            SELECT guild_id, channel_id, streamer, mentions
            FROM twitch_follows
            WHERE streamer = $1
            ORDER BY channel_id
            ",
        )
        .bind(subject.to_lowercase())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list follows", &e))?;
        Ok(rows.into_iter().map(Follow::from).collect())
    }
}
