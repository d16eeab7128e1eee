//! Jobs the worker gave up on.
//!
//! A job lands here when its payload can't be decoded, no handler is
//! registered for it, it fails permanently, or it runs out of attempts. The
//! queue is bounded and in-memory: at capacity the oldest entry is evicted.

use crate::health::HealthCheck;
use crate::metrics::DlqMetrics;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A dead-lettered payload and why it failed.
#[derive(Debug, Clone)]
pub struct DeadLetter<T> {
    /// The payload as the worker last saw it.
    pub payload: T,
    /// Attempts made, including the last one.
    pub attempts: u32,
    /// Rendered error of the last attempt.
    pub error_message: String,
    /// When it was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

/// Bounded dead letter queue. Clones share the same entries.
#[derive(Debug)]
pub struct DeadLetterQueue<T> {
    entries: Arc<Mutex<VecDeque<DeadLetter<T>>>>,
    capacity: usize,
}

impl<T> DeadLetterQueue<T> {
    /// An empty queue holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<DeadLetter<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failed payload.
    pub fn push(&self, payload: T, error_message: String, attempts: u32) {
        let mut entries = self.entries();
        while entries.len() >= self.capacity.max(1) {
            entries.pop_front();
            tracing::warn!(capacity = self.capacity, "Dead letter queue full, evicted oldest entry");
        }
        entries.push_back(DeadLetter {
            payload,
            attempts,
            error_message,
            failed_at: Utc::now(),
        });

        let size = entries.len();
        DlqMetrics::record_size(size);
        tracing::warn!(attempts, size, "Job dead-lettered");
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// `true` when nothing has been dead-lettered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Take every entry, oldest first.
    pub fn drain(&self) -> Vec<DeadLetter<T>> {
        let drained: Vec<_> = self.entries().drain(..).collect();
        DlqMetrics::record_size(0);
        tracing::info!(count = drained.len(), "Dead letter queue drained");
        drained
    }

    /// The oldest entry, left in place.
    #[must_use]
    pub fn peek(&self) -> Option<DeadLetter<T>>
    where
        T: Clone,
    {
        self.entries().front().cloned()
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.capacity
    }

    /// Degraded once more than half full.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let size = self.len();
        let check = if size * 2 > self.capacity {
            HealthCheck::degraded("dead_letter_queue", format!("{size} dead-lettered jobs"))
        } else {
            HealthCheck::healthy("dead_letter_queue")
        };
        check
            .with_metadata("size", size.to_string())
            .with_metadata("max_size", self.capacity.to_string())
    }
}

impl<T> Clone for DeadLetterQueue<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            capacity: self.capacity,
        }
    }
}

impl<T> Default for DeadLetterQueue<T> {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    #[test]
    fn evicts_the_oldest_entry_when_full() {
        let dlq = DeadLetterQueue::new(2);
        for payload in ["a", "b", "c"] {
            dlq.push(payload, "boom".into(), 1);
        }

        assert_eq!(dlq.len(), 2);
        assert_eq!(dlq.peek().unwrap().payload, "b");
    }

    #[test]
    fn drain_returns_entries_and_empties() {
        let dlq = DeadLetterQueue::new(10);
        dlq.push(1, "x".into(), 5);

        let drained = dlq.drain();

        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].attempts, 5);
        assert!(dlq.is_empty());
    }

    #[test]
    fn clones_see_the_same_entries() {
        let dlq = DeadLetterQueue::new(10);
        dlq.clone().push(1, "x".into(), 0);
        assert_eq!(dlq.len(), 1);
    }

    #[test]
    fn health_degrades_past_half_capacity() {
        let dlq = DeadLetterQueue::new(4);
        dlq.push(1, "x".into(), 0);
        dlq.push(2, "x".into(), 0);
        assert!(dlq.health().status.is_healthy());

        dlq.push(3, "x".into(), 0);
        let check = dlq.health();
        assert_eq!(check.status, HealthStatus::Degraded);
        assert!(check.metadata.contains(&("size".to_string(), "3".to_string())));
    }
}
