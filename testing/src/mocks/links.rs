//! In-memory link store.

use super::lock;
use herald_core::model::{LinkOutcome, LinkRecord, SourceEntity};
use herald_core::providers::LinkStore;
use herald_core::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    sources: HashMap<String, SourceEntity>,
    links: HashMap<String, LinkRecord>,
    /// Row a concurrent writer commits just before the next insert.
    race: Option<LinkRecord>,
    inserts: usize,
}

/// In-memory link store with a unique constraint on `source_id`.
///
/// [`InMemoryLinkStore::race_link`] lets a test inject a competing row that
/// lands between the engine's lookup and its insert.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLinkStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryLinkStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `record` on behalf of another writer right before the next
    /// `insert_link` call.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn race_link(&self, record: LinkRecord) -> Result<()> {
        lock(&self.state)?.race = Some(record);
        Ok(())
    }

    /// Every stored link.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn links(&self) -> Result<Vec<LinkRecord>> {
        Ok(lock(&self.state)?.links.values().cloned().collect())
    }

    /// Number of `insert_link` calls, including conflicting ones.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn insert_attempts(&self) -> Result<usize> {
        Ok(lock(&self.state)?.inserts)
    }
}

impl LinkStore for InMemoryLinkStore {
    fn record_source(&self, source: &SourceEntity) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let source = source.clone();

        async move {
            lock(&state)?
                .sources
                .entry(source.id.clone())
                .or_insert(source);
            Ok(())
        }
    }

    fn source(&self, source_id: &str) -> impl Future<Output = Result<Option<SourceEntity>>> + Send {
        let state = Arc::clone(&self.state);
        let source_id = source_id.to_string();

        async move { Ok(lock(&state)?.sources.get(&source_id).cloned()) }
    }

    fn insert_link(&self, link: &LinkRecord) -> impl Future<Output = Result<LinkOutcome>> + Send {
        let state = Arc::clone(&self.state);
        let link = link.clone();

        async move {
            let mut state = lock(&state)?;
            state.inserts += 1;
            if let Some(raced) = state.race.take() {
                state.links.entry(raced.source_id.clone()).or_insert(raced);
            }

            if let Some(existing) = state.links.get(&link.source_id) {
                return Ok(LinkOutcome::Existing(existing.clone()));
            }
            state.links.insert(link.source_id.clone(), link.clone());
            Ok(LinkOutcome::Inserted(link))
        }
    }

    fn link(&self, source_id: &str) -> impl Future<Output = Result<Option<LinkRecord>>> + Send {
        let state = Arc::clone(&self.state);
        let source_id = source_id.to_string();

        async move { Ok(lock(&state)?.links.get(&source_id).cloned()) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(source: &str, representation: &str) -> LinkRecord {
        LinkRecord {
            source_id: source.into(),
            guild_id: "g1".into(),
            location_id: "10".into(),
            thread_id: None,
            owner_id: "u1".into(),
            representation_location_id: "500".into(),
            representation_id: representation.into(),
        }
    }

    #[tokio::test]
    async fn duplicate_insert_returns_existing_row() {
        let store = InMemoryLinkStore::new();
        let first = store.insert_link(&record("1", "p1")).await.unwrap();
        let second = store.insert_link(&record("1", "p2")).await.unwrap();

        assert_eq!(first, LinkOutcome::Inserted(record("1", "p1")));
        assert_eq!(second, LinkOutcome::Existing(record("1", "p1")));
        assert_eq!(store.links().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn raced_row_wins() {
        let store = InMemoryLinkStore::new();
        store.race_link(record("1", "theirs")).unwrap();
        let outcome = store.insert_link(&record("1", "ours")).await.unwrap();
        assert_eq!(outcome.record().representation_id, "theirs");
    }
}
