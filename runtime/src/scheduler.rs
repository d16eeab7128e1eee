//! Typed enqueueing on top of a [`JobQueue`].

use crate::metrics::JobMetrics;
use herald_core::environment::Clock;
use herald_core::job::{Job, JobId, JobPayload};
use herald_core::providers::JobQueue;
use herald_core::{HeraldError, Result};
use std::time::Duration;

/// Producer side of the job system.
///
/// Handlers hold a clone to enqueue follow-up work, including re-enqueueing
/// themselves; the chain travels through the queue, so it survives restarts.
#[derive(Debug, Clone)]
pub struct Scheduler<Q, K> {
    queue: Q,
    clock: K,
}

impl<Q, K> Scheduler<Q, K>
where
    Q: JobQueue,
    K: Clock,
{
    /// Create a scheduler over a queue and clock.
    #[must_use]
    pub const fn new(queue: Q, clock: K) -> Self {
        Self { queue, clock }
    }

    /// Enqueue `payload` to run after `delay`.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be encoded or the queue is
    /// unreachable.
    pub async fn enqueue(&self, payload: &JobPayload, delay: Duration) -> Result<JobId> {
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| HeraldError::Internal(format!("delay out of range: {e}")))?;
        let job = Job::new(payload, self.clock.now() + delay)?;
        let id = self.queue.enqueue(&job).await?;

        JobMetrics::record_enqueued(&job.name);
        tracing::debug!(job_id = %id, job = %job.name, not_before = %job.not_before, "Job enqueued");
        Ok(id)
    }

    /// Whether job `id` is still waiting or running.
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unreachable.
    pub async fn is_queued(&self, id: &JobId) -> Result<bool> {
        self.queue.contains(id).await
    }

    /// The underlying queue.
    #[must_use]
    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    /// The clock used to stamp `not_before`.
    #[must_use]
    pub const fn clock(&self) -> &K {
        &self.clock
    }
}
