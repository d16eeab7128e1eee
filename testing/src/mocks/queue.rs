//! In-memory job queue.

use super::lock;
use chrono::{DateTime, Utc};
use herald_core::job::{Job, JobId, JobName};
use herald_core::providers::JobQueue;
use herald_core::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    /// Leased job ids and their lease deadlines.
    leases: HashMap<JobId, DateTime<Utc>>,
    enqueued: usize,
}

/// In-memory job queue with the same lease semantics as the Redis queue.
///
/// Jobs are leased in `not_before` order; ties are unordered, as in a sorted
/// set with equal scores.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobQueue {
    state: Arc<Mutex<State>>,
}

impl InMemoryJobQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs waiting to run (not leased), ordered by `not_before`.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn pending(&self) -> Result<Vec<Job>> {
        let state = lock(&self.state)?;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| !state.leases.contains_key(&job.id))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.not_before);
        Ok(jobs)
    }

    /// Pending jobs with the given name.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn pending_named(&self, name: JobName) -> Result<Vec<Job>> {
        Ok(self
            .pending()?
            .into_iter()
            .filter(|job| job.name == name.as_str())
            .collect())
    }

    /// Total number of `enqueue` calls.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn enqueued(&self) -> Result<usize> {
        Ok(lock(&self.state)?.enqueued)
    }

    /// Drop every pending and leased job.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        let mut state = lock(&self.state)?;
        state.jobs.clear();
        state.leases.clear();
        Ok(())
    }
}

fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(lease).map_or(now, |lease| now + lease)
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue(&self, job: &Job) -> impl Future<Output = Result<JobId>> + Send {
        let state = Arc::clone(&self.state);
        let job = job.clone();

        async move {
            let mut state = lock(&state)?;
            state.enqueued += 1;
            let id = job.id;
            state.jobs.insert(id, job);
            Ok(id)
        }
    }

    fn dequeue(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease: Duration,
    ) -> impl Future<Output = Result<Vec<Job>>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut state = lock(&state)?;
            let mut due: Vec<Job> = state
                .jobs
                .values()
                .filter(|job| job.not_before <= now && !state.leases.contains_key(&job.id))
                .cloned()
                .collect();
            due.sort_by_key(|job| job.not_before);
            due.truncate(limit);

            let deadline = lease_deadline(now, lease);
            for job in &due {
                state.leases.insert(job.id, deadline);
            }
            Ok(due)
        }
    }

    fn ack(&self, id: &JobId) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let id = *id;

        async move {
            let mut state = lock(&state)?;
            state.jobs.remove(&id);
            state.leases.remove(&id);
            Ok(())
        }
    }

    fn reschedule(&self, job: &Job) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let job = job.clone();

        async move {
            let mut state = lock(&state)?;
            state.leases.remove(&job.id);
            state.jobs.insert(job.id, job);
            Ok(())
        }
    }

    fn reclaim(&self, now: DateTime<Utc>) -> impl Future<Output = Result<usize>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut state = lock(&state)?;
            let before = state.leases.len();
            state.leases.retain(|_, deadline| *deadline > now);
            Ok(before - state.leases.len())
        }
    }

    fn contains(&self, id: &JobId) -> impl Future<Output = Result<bool>> + Send {
        let state = Arc::clone(&self.state);
        let id = *id;

        async move { Ok(lock(&state)?.jobs.contains_key(&id)) }
    }

    fn depth(&self) -> impl Future<Output = Result<usize>> + Send {
        let state = Arc::clone(&self.state);

        async move { Ok(lock(&state)?.jobs.len()) }
    }
}
