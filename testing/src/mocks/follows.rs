//! In-memory follow registry.

use super::lock;
use herald_core::model::Follow;
use herald_core::providers::FollowRegistry;
use herald_core::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// In-memory follow registry keyed by `(location, subject)`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFollowRegistry {
    follows: Arc<Mutex<BTreeMap<(String, String), Follow>>>,
}

impl InMemoryFollowRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored follows.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(lock(&self.follows)?.len())
    }

    /// Whether no follows are stored.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(lock(&self.follows)?.is_empty())
    }
}

impl FollowRegistry for InMemoryFollowRegistry {
    fn follow(&self, follow: &Follow) -> impl Future<Output = Result<()>> + Send {
        let follows = Arc::clone(&self.follows);
        let mut follow = follow.clone();
        follow.subject = follow.subject.to_lowercase();

        async move {
            lock(&follows)?.insert((follow.location_id.clone(), follow.subject.clone()), follow);
            Ok(())
        }
    }

    fn unfollow(&self, location_id: &str, subject: &str) -> impl Future<Output = Result<bool>> + Send {
        let follows = Arc::clone(&self.follows);
        let key = (location_id.to_string(), subject.to_lowercase());

        async move { Ok(lock(&follows)?.remove(&key).is_some()) }
    }

    fn subjects(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        let follows = Arc::clone(&self.follows);

        async move {
            let mut subjects: Vec<String> = lock(&follows)?
                .values()
                .map(|follow| follow.subject.clone())
                .collect();
            subjects.sort();
            subjects.dedup();
            Ok(subjects)
        }
    }

    fn targets(&self, subject: &str) -> impl Future<Output = Result<Vec<Follow>>> + Send {
        let follows = Arc::clone(&self.follows);
        let subject = subject.to_lowercase();

        async move {
            Ok(lock(&follows)?
                .values()
                .filter(|follow| follow.subject == subject)
                .cloned()
                .collect())
        }
    }
}
