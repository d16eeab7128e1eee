//! Job worker.
//!
//! The worker is a long-running loop that:
//! - reclaims expired leases (jobs whose worker crashed mid-run)
//! - leases due jobs, bounded by a semaphore
//! - validates each payload at the dequeue boundary
//! - runs the handler in its own task under a timeout, so a panic or a hang
//!   only affects that job
//! - acks, reschedules with backoff, or dead-letters based on the outcome
//!
//! ```text
//! Worker
//!     │
//!     ├─► reclaim(now)
//!     ├─► dequeue(now, free permits, lease)
//!     ├─► decode payload ──(malformed / unknown)──► DLQ + ack
//!     ├─► spawn(timeout(handler(payload)))
//!     └─► Ok ► ack │ retryable ► reschedule / DLQ │ terminal ► ack
//! ```

use crate::metrics::JobMetrics;
use crate::registry::HandlerRegistry;
use crate::retry::RetryPolicy;
use crate::DeadLetterQueue;
use futures::future::join_all;
use herald_core::environment::Clock;
use herald_core::job::Job;
use herald_core::providers::JobQueue;
use herald_core::{HeraldError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs running at once
    pub concurrency: usize,
    /// Sleep between polls of the queue
    pub poll_interval: Duration,
    /// Upper bound on a single handler execution
    pub job_timeout: Duration,
    /// How long a dequeued job stays leased before it is reclaimed
    pub lease: Duration,
    /// Backoff and attempt limit for retryable failures
    pub retry_policy: RetryPolicy,
    /// Maximum size of the dead letter queue
    pub dlq_max_size: usize,
}

impl WorkerConfig {
    /// Create a configuration with explicit values.
    #[must_use]
    pub const fn new(
        concurrency: usize,
        poll_interval: Duration,
        job_timeout: Duration,
        lease: Duration,
        retry_policy: RetryPolicy,
        dlq_max_size: usize,
    ) -> Self {
        Self {
            concurrency,
            poll_interval,
            job_timeout,
            lease,
            retry_policy,
            dlq_max_size,
        }
    }

    /// Set the concurrency limit
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-job timeout
    #[must_use]
    pub const fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Set the lease duration
    #[must_use]
    pub const fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the DLQ maximum size
    #[must_use]
    pub const fn with_dlq_max_size(mut self, max_size: usize) -> Self {
        self.dlq_max_size = max_size;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 16,
            poll_interval: Duration::from_millis(500),
            job_timeout: Duration::from_secs(30),
            lease: Duration::from_secs(120),
            retry_policy: RetryPolicy::default(),
            dlq_max_size: 1000,
        }
    }
}

/// How a job execution was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Handler succeeded; job acknowledged.
    Completed,
    /// Retryable failure; job put back with backoff.
    Rescheduled,
    /// Terminal failure (e.g. target gone); job acknowledged.
    Dropped,
    /// Malformed, unknown, or out of attempts; job moved to the DLQ.
    DeadLettered,
}

/// A job worker that processes jobs from a [`JobQueue`].
///
/// Clones share the semaphore and dead letter queue.
#[derive(Clone)]
pub struct Worker<Q, K> {
    queue: Q,
    clock: K,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    permits: Arc<Semaphore>,
    dlq: DeadLetterQueue<Job>,
}

impl<Q, K> Worker<Q, K>
where
    Q: JobQueue + Clone + 'static,
    K: Clock + Clone + 'static,
{
    /// Create a worker.
    #[must_use]
    pub fn new(queue: Q, clock: K, registry: Arc<HandlerRegistry>, config: WorkerConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            queue,
            clock,
            registry,
            permits: Arc::new(Semaphore::new(concurrency)),
            dlq: DeadLetterQueue::new(config.dlq_max_size),
            config,
        }
    }

    /// Jobs that were dead-lettered by this worker.
    #[must_use]
    pub fn dlq(&self) -> DeadLetterQueue<Job> {
        self.dlq.clone()
    }

    /// Run until `shutdown` flips to `true`, then wait for running jobs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis(),
            "Job worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.spawn_due().await {
                tracing::warn!(error = %e, "Job poll failed");
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!("Job worker stopping, waiting for running jobs");
        let all = u32::try_from(self.config.concurrency.max(1)).unwrap_or(u32::MAX);
        let drained = tokio::time::timeout(self.config.job_timeout, self.permits.acquire_many(all)).await;
        if drained.is_err() {
            tracing::warn!("Timed out waiting for running jobs; their leases will be reclaimed");
        }
        tracing::info!("Job worker stopped");
    }

    /// Lease due jobs and run them to completion.
    ///
    /// # Returns
    ///
    /// Number of jobs processed.
    ///
    /// # Errors
    ///
    /// Returns error if the queue cannot be polled.
    pub async fn run_once(&self) -> Result<usize> {
        let leased = self.lease().await?;
        let count = leased.len();
        join_all(leased.into_iter().map(|(job, permit)| async move {
            self.process(job).await;
            drop(permit);
        }))
        .await;
        Ok(count)
    }

    async fn spawn_due(&self) -> Result<()> {
        for (job, permit) in self.lease().await? {
            let worker = self.clone();
            tokio::spawn(async move {
                worker.process(job).await;
                drop(permit);
            });
        }
        Ok(())
    }

    async fn lease(&self) -> Result<Vec<(Job, OwnedSemaphorePermit)>> {
        let now = self.clock.now();
        let reclaimed = self.queue.reclaim(now).await?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Reclaimed jobs with expired leases");
        }

        let available = self.permits.available_permits();
        if available == 0 {
            return Ok(Vec::new());
        }

        let jobs = self.queue.dequeue(now, available, self.config.lease).await?;
        let mut leased = Vec::with_capacity(jobs.len());
        for job in jobs {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| HeraldError::Internal("Worker semaphore closed".to_string()))?;
            leased.push((job, permit));
        }
        Ok(leased)
    }

    /// Execute one leased job and settle it.
    pub async fn process(&self, job: Job) -> Settlement {
        let payload = match job.decode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %job.id, job = %job.name, error = %e, "Rejected job at dequeue");
                return self.dead_letter(job, &e, "malformed").await;
            }
        };

        let handler = match self.registry.dispatch(payload) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(job_id = %job.id, job = %job.name, error = %e, "No handler for job");
                return self.dead_letter(job, &e, "unknown").await;
            }
        };

        let started = Instant::now();
        let timeout = self.config.job_timeout;
        let outcome = match tokio::spawn(tokio::time::timeout(timeout, handler)).await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(HeraldError::Timeout {
                operation: format!("job {}", job.name),
            }),
            Err(join_error) => Err(HeraldError::Transient(format!("handler task failed: {join_error}"))),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => {
                JobMetrics::record_completed(&job.name, elapsed);
                tracing::debug!(job_id = %job.id, job = %job.name, "Job completed");
                self.ack(&job).await;
                Settlement::Completed
            }
            Err(e) => {
                JobMetrics::record_failed(&job.name, e.kind(), elapsed);
                self.settle_failure(job, &e).await
            }
        }
    }

    async fn settle_failure(&self, mut job: Job, error: &HeraldError) -> Settlement {
        if error.is_malformed() {
            tracing::error!(job_id = %job.id, job = %job.name, error = %error, "Handler rejected payload");
            return self.dead_letter(job, error, "malformed").await;
        }

        if !error.is_retryable() {
            if error.is_not_found() {
                tracing::info!(job_id = %job.id, job = %job.name, error = %error, "Job target gone, dropping");
            } else {
                tracing::error!(job_id = %job.id, job = %job.name, error = %error, "Job failed permanently");
            }
            JobMetrics::record_dropped(&job.name, error.kind());
            self.ack(&job).await;
            return Settlement::Dropped;
        }

        let attempts = job.attempt + 1;
        if !self.config.retry_policy.allows_retry(attempts) {
            tracing::error!(job_id = %job.id, job = %job.name, attempts, error = %error, "Job exhausted retries");
            job.attempt = attempts;
            return self.dead_letter(job, error, "exhausted").await;
        }

        let delay = self.config.retry_policy.delay_for_attempt(job.attempt);
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        job.attempt = attempts;
        job.not_before = self.clock.now() + delay;

        tracing::warn!(
            job_id = %job.id,
            job = %job.name,
            attempt = attempts,
            retry_at = %job.not_before,
            error = %error,
            "Job failed, rescheduling"
        );
        JobMetrics::record_retried(&job.name);
        if let Err(e) = self.queue.reschedule(&job).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to reschedule job; lease will expire");
        }
        Settlement::Rescheduled
    }

    async fn dead_letter(&self, job: Job, error: &HeraldError, reason: &'static str) -> Settlement {
        JobMetrics::record_dropped(&job.name, reason);
        self.ack(&job).await;
        let attempts = job.attempt;
        self.dlq.push(job, error.to_string(), attempts);
        Settlement::DeadLettered
    }

    async fn ack(&self, job: &Job) {
        if let Err(e) = self.queue.ack(&job.id).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to ack job; it may run again");
        }
    }
}
