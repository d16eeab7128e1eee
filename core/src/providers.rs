//! Provider traits for injected collaborators.
//!
//! The engine receives every collaborator through its environment; these
//! traits are the seams. Production implementations live in `herald-redis`,
//! `herald-postgres` and `herald-clients`; in-memory ones in `herald-testing`.

use crate::content::MessageContent;
use crate::error::Result;
use crate::job::{Job, JobId};
use crate::model::{
    Channel, Follow, LinkOutcome, LinkRecord, Message, SettingKey, SourceEntity, StreamStatus,
    SubjectProfile,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Client for the downstream messaging surface.
///
/// # Implementation Notes
///
/// - Every call carries a bounded timeout; an elapsed timeout surfaces as
///   `HeraldError::Timeout`, never as `NotFound`
/// - A missing channel or message surfaces as `HeraldError::NotFound`
pub trait MessagingClient: Send + Sync {
    /// Send a new message.
    ///
    /// # Returns
    ///
    /// The id of the created message.
    ///
    /// # Errors
    ///
    /// Returns error if the channel is missing or the request fails.
    fn send(
        &self,
        location_id: &str,
        content: &MessageContent,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Edit an existing message.
    ///
    /// # Errors
    ///
    /// Returns error if the message is missing or the request fails.
    fn edit(
        &self,
        location_id: &str,
        message_id: &str,
        content: &MessageContent,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch a message.
    ///
    /// # Errors
    ///
    /// Returns `HeraldError::NotFound` if the message or channel is gone.
    fn fetch(
        &self,
        location_id: &str,
        message_id: &str,
    ) -> impl Future<Output = Result<Message>> + Send;

    /// Delete a message.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn delete(
        &self,
        location_id: &str,
        message_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch channel metadata.
    ///
    /// # Errors
    ///
    /// Returns `HeraldError::NotFound` if the channel is gone.
    fn channel(&self, location_id: &str) -> impl Future<Output = Result<Channel>> + Send;

    /// List the ids of every user who reacted with `emoji`.
    ///
    /// # Errors
    ///
    /// Returns error if the message is missing or the request fails.
    fn reactors(
        &self,
        location_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Third-party live status API.
pub trait StatusApi: Send + Sync {
    /// Fetch the status of a batch of subjects.
    ///
    /// Subjects present in the result are online; absent ones are offline.
    /// Callers keep batches at or below [`StatusApi::MAX_BATCH`].
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or times out.
    fn streams(&self, subjects: &[String]) -> impl Future<Output = Result<Vec<StreamStatus>>> + Send;

    /// Fetch profile data for one subject.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn profile(&self, login: &str) -> impl Future<Output = Result<Option<SubjectProfile>>> + Send;

    /// Fetch the box-art URL of a category.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn category_art(&self, category_id: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Largest batch accepted by [`StatusApi::streams`].
    const MAX_BATCH: usize = 100;
}

/// Durable per-tenant configuration.
pub trait ConfigurationStore: Send + Sync {
    /// Read a setting.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get(
        &self,
        guild_id: &str,
        key: SettingKey,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write a setting.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn set(
        &self,
        guild_id: &str,
        key: SettingKey,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Durable store for source entities and their link records.
///
/// # Implementation Notes
///
/// - `source_id` is unique; [`LinkStore::insert_link`] never fails on a
///   duplicate, it returns the stored row as [`LinkOutcome::Existing`]
pub trait LinkStore: Send + Sync {
    /// Record a source entity the first time it is observed.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn record_source(&self, source: &SourceEntity) -> impl Future<Output = Result<()>> + Send;

    /// Look up a source entity.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn source(&self, source_id: &str) -> impl Future<Output = Result<Option<SourceEntity>>> + Send;

    /// Create the link if absent.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails for any reason other than a conflict.
    fn insert_link(&self, link: &LinkRecord) -> impl Future<Output = Result<LinkOutcome>> + Send;

    /// Look up the link for a source entity.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn link(&self, source_id: &str) -> impl Future<Output = Result<Option<LinkRecord>>> + Send;
}

/// Durable registry of channels following subjects.
pub trait FollowRegistry: Send + Sync {
    /// Insert or replace a follow.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn follow(&self, follow: &Follow) -> impl Future<Output = Result<()>> + Send;

    /// Remove a follow.
    ///
    /// # Returns
    ///
    /// `true` if a follow was removed.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn unfollow(&self, location_id: &str, subject: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Every distinct followed subject.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn subjects(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Every follow of one subject.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn targets(&self, subject: &str) -> impl Future<Output = Result<Vec<Follow>>> + Send;
}

/// Fast key/value store holding counters, status records and caches.
///
/// # Implementation Notes
///
/// - Entries may be evicted at any time; callers treat a miss as empty
/// - Set and key-existence operations are atomic
pub trait EphemeralStore: Send + Sync {
    /// Add members to a set, returning how many were new.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn sadd(&self, key: &str, members: &[String]) -> impl Future<Output = Result<usize>> + Send;

    /// Replace a set's members in one atomic step, returning the new
    /// cardinality. An empty `members` deletes the set.
    ///
    /// Readers never observe the set empty or half-written.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn replace_set(&self, key: &str, members: &[String]) -> impl Future<Output = Result<usize>> + Send;

    /// Remove a member from a set, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn srem(&self, key: &str, member: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Cardinality of a set (0 when absent).
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn scard(&self, key: &str) -> impl Future<Output = Result<usize>> + Send;

    /// Write hash fields.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn hset(&self, key: &str, fields: &[(String, String)]) -> impl Future<Output = Result<()>> + Send;

    /// Read all hash fields (empty when absent).
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn hgetall(&self, key: &str) -> impl Future<Output = Result<HashMap<String, String>>> + Send;

    /// Delete a key, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn del(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Check whether a key exists.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// List keys matching a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Read a string value.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write a string value with expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Write a string value with expiry only if the key is absent.
    ///
    /// # Returns
    ///
    /// `true` if this call wrote the key.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Round-trip check used by health reporting.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// At-least-once delayed job queue.
///
/// # Implementation Notes
///
/// - [`JobQueue::dequeue`] leases jobs; a lease that expires without
///   [`JobQueue::ack`] or [`JobQueue::reschedule`] is returned to the queue by
///   [`JobQueue::reclaim`]
/// - Payloads are stored and returned verbatim
pub trait JobQueue: Send + Sync {
    /// Store a job.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    fn enqueue(&self, job: &Job) -> impl Future<Output = Result<JobId>> + Send;

    /// Lease up to `limit` jobs due at `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    fn dequeue(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease: Duration,
    ) -> impl Future<Output = Result<Vec<Job>>> + Send;

    /// Remove a finished job.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    fn ack(&self, id: &JobId) -> impl Future<Output = Result<()>> + Send;

    /// Release a leased job back to the queue with new attempt/not-before.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    fn reschedule(&self, job: &Job) -> impl Future<Output = Result<()>> + Send;

    /// Return expired leases to the queue.
    ///
    /// # Returns
    ///
    /// Number of jobs reclaimed.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    fn reclaim(&self, now: DateTime<Utc>) -> impl Future<Output = Result<usize>> + Send;

    /// Whether the job is still waiting or leased.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    fn contains(&self, id: &JobId) -> impl Future<Output = Result<bool>> + Send;

    /// Number of jobs waiting or leased.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    fn depth(&self) -> impl Future<Output = Result<usize>> + Send;
}
