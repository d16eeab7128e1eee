//! Redis-backed [`EphemeralStore`].

use crate::{connect, redis_error};
use herald_core::providers::EphemeralStore;
use herald_core::Result;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

/// Page size hint for `SCAN`.
const SCAN_COUNT: usize = 500;

/// Redis ephemeral store.
///
/// Every operation is a single Redis command or one `MULTI` block, so set
/// membership, set replacement and `SET NX` claims are atomic across
/// processes.
#[derive(Clone)]
pub struct RedisEphemeralStore {
    conn_manager: ConnectionManager,
}

impl RedisEphemeralStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Ok(Self::from_manager(connect(redis_url).await?))
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

/// Redis expiries are whole seconds; never round a short TTL down to zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

impl EphemeralStore for RedisEphemeralStore {
    async fn sadd(&self, key: &str, members: &[String]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn_manager.clone();
        conn.sadd(key, members)
            .await
            .map_err(|e| redis_error("add set members", &e))
    }

    async fn replace_set(&self, key: &str, members: &[String]) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !members.is_empty() {
            pipe.sadd(key, members).ignore();
        }
        pipe.scard(key);

        let (count,): (usize,) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("replace set", &e))?;
        Ok(count)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let removed: usize = conn
            .srem(key, member)
            .await
            .map_err(|e| redis_error("remove set member", &e))?;
        Ok(removed > 0)
    }

    async fn scard(&self, key: &str) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        conn.scard(key)
            .await
            .map_err(|e| redis_error("count set members", &e))
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .hset_multiple(key, fields)
            .await
            .map_err(|e| redis_error("write hash", &e))?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn_manager.clone();
        conn.hgetall(key)
            .await
            .map_err(|e| redis_error("read hash", &e))
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let deleted: usize = conn
            .del(key)
            .await
            .map_err(|e| redis_error("delete key", &e))?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        conn.exists(key)
            .await
            .map_err(|e| redis_error("check key existence", &e))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| redis_error("scan keys", &e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        conn.get(key)
            .await
            .map_err(|e| redis_error("read value", &e))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds(ttl))
            .await
            .map_err(|e| redis_error("write value", &e))?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("claim key", &e))?;
        Ok(reply.is_some())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("ping", &e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_ttls_round_up() {
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(90)), 90);
    }
}
