//! Redis-backed [`JobQueue`].
//!
//! Three keys hold the queue:
//!
//! ```text
//! jobs:data       HASH  id -> job JSON (verbatim payload)
//! jobs:scheduled  ZSET  id scored by not_before (ms)
//! jobs:inflight   ZSET  id scored by lease deadline (ms)
//! ```
//!
//! `dequeue` moves due ids from `scheduled` to `inflight` inside one Lua
//! script, so two workers never lease the same job. A worker that dies
//! mid-job leaves its id in `inflight`; `reclaim` moves expired leases back.

use crate::{connect, redis_error};
use chrono::{DateTime, Utc};
use herald_core::job::{Job, JobId};
use herald_core::providers::JobQueue;
use herald_core::{HeraldError, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

const DATA_KEY: &str = "jobs:data";
const SCHEDULED_KEY: &str = "jobs:scheduled";
const INFLIGHT_KEY: &str = "jobs:inflight";

/// Returns a flat `{id, body, id, body, ...}` list of leased jobs.
const LEASE_SCRIPT: &str = r"
    local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
    local leased = {}
    for _, id in ipairs(due) do
        redis.call('ZREM', KEYS[1], id)
        local body = redis.call('HGET', KEYS[3], id)
        if body then
            redis.call('ZADD', KEYS[2], ARGV[3], id)
            table.insert(leased, id)
            table.insert(leased, body)
        end
    end
    return leased
";

const RECLAIM_SCRIPT: &str = r"
    local expired = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
    for _, id in ipairs(expired) do
        redis.call('ZREM', KEYS[1], id)
        redis.call('ZADD', KEYS[2], ARGV[1], id)
    end
    return #expired
";

/// Redis job queue.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn_manager: ConnectionManager,
}

impl RedisJobQueue {
    /// Connect to Redis.
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

fn score(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn encode(job: &Job) -> Result<String> {
    serde_json::to_string(job).map_err(|e| HeraldError::Serialization(e.to_string()))
}

impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<JobId> {
        let mut conn = self.conn_manager.clone();
        let id = job.id.to_string();
        let body = encode(job)?;

        let _: () = redis::pipe()
            .atomic()
            .hset(DATA_KEY, &id, body)
            .ignore()
            .zadd(SCHEDULED_KEY, &id, score(job.not_before))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("enqueue job", &e))?;

        Ok(job.id)
    }

    async fn dequeue(&self, now: DateTime<Utc>, limit: usize, lease: Duration) -> Result<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn_manager.clone();
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| HeraldError::Internal(format!("lease out of range: {e}")))?;

        let leased: Vec<String> = redis::Script::new(LEASE_SCRIPT)
            .key(SCHEDULED_KEY)
            .key(INFLIGHT_KEY)
            .key(DATA_KEY)
            .arg(score(now))
            .arg(limit)
            .arg(score(now + lease))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("lease jobs", &e))?;

        let mut jobs = Vec::with_capacity(leased.len() / 2);
        for pair in leased.chunks_exact(2) {
            let (id, body) = (&pair[0], &pair[1]);
            match serde_json::from_str::<Job>(body) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    // Without an envelope there is nothing to dead-letter.
                    tracing::error!(job_id = %id, error = %e, "Discarding unreadable job envelope");
                    let _: () = redis::pipe()
                        .atomic()
                        .hdel(DATA_KEY, id)
                        .ignore()
                        .zrem(INFLIGHT_KEY, id)
                        .ignore()
                        .query_async(&mut conn)
                        .await
                        .map_err(|e| redis_error("discard job", &e))?;
                }
            }
        }
        Ok(jobs)
    }

    async fn ack(&self, id: &JobId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let id = id.to_string();

        let _: () = redis::pipe()
            .atomic()
            .hdel(DATA_KEY, &id)
            .ignore()
            .zrem(INFLIGHT_KEY, &id)
            .ignore()
            .zrem(SCHEDULED_KEY, &id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("ack job", &e))?;
        Ok(())
    }

    async fn reschedule(&self, job: &Job) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let id = job.id.to_string();
        let body = encode(job)?;

        let _: () = redis::pipe()
            .atomic()
            .hset(DATA_KEY, &id, body)
            .ignore()
            .zrem(INFLIGHT_KEY, &id)
            .ignore()
            .zadd(SCHEDULED_KEY, &id, score(job.not_before))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("reschedule job", &e))?;
        Ok(())
    }

    async fn reclaim(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        redis::Script::new(RECLAIM_SCRIPT)
            .key(INFLIGHT_KEY)
            .key(SCHEDULED_KEY)
            .arg(score(now))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("reclaim leases", &e))
    }

    async fn contains(&self, id: &JobId) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        conn.hexists(DATA_KEY, id.to_string())
            .await
            .map_err(|e| redis_error("look up job", &e))
    }

    async fn depth(&self) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        conn.hlen(DATA_KEY)
            .await
            .map_err(|e| redis_error("measure queue", &e))
    }
}
