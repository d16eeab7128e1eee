//! In-memory ephemeral store.

use super::lock;
use herald_core::providers::EphemeralStore;
use herald_core::{HeraldError, Result};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Text(String, Option<Instant>),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Value>,
}

impl State {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.entries
            .retain(|_, value| !matches!(value, Value::Text(_, Some(deadline)) if *deadline <= now));
    }
}

/// In-memory ephemeral store with Redis-like semantics.
///
/// Supports expiry on string values, simulated outages and wholesale
/// eviction (to model a cache flush or a lost instance).
#[derive(Debug, Clone, Default)]
pub struct InMemoryEphemeralStore {
    state: Arc<Mutex<State>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEphemeralStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a cache error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Drop every key.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn evict_all(&self) -> Result<()> {
        lock(&self.state)?.entries.clear();
        Ok(())
    }

    /// Snapshot of a set's members (for assertions).
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn members(&self, key: &str) -> Result<HashSet<String>> {
        Ok(match lock(&self.state)?.entries.get(key) {
            Some(Value::Set(members)) => members.clone(),
            _ => HashSet::new(),
        })
    }

    fn guard(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(HeraldError::Cache("connection refused".to_string()));
        }
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        self.guard()?;
        let mut state = lock(&self.state)?;
        state.purge_expired();
        f(&mut state)
    }
}

fn wrong_type(key: &str) -> HeraldError {
    HeraldError::Cache(format!("WRONGTYPE Operation against key {key} holding the wrong kind of value"))
}

/// Glob match supporting `*` wildcards only.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }

    let mut rest = candidate;
    for (index, part) in parts.iter().enumerate() {
        if index == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if index == parts.len() - 1 {
            return rest.ends_with(part);
        } else if let Some(position) = rest.find(part) {
            rest = &rest[position + part.len()..];
        } else {
            return false;
        }
    }
    true
}

impl EphemeralStore for InMemoryEphemeralStore {
    fn sadd(&self, key: &str, members: &[String]) -> impl Future<Output = Result<usize>> + Send {
        let result = self.with_state(|state| {
            let entry = state
                .entries
                .entry(key.to_string())
                .or_insert_with(|| Value::Set(HashSet::new()));
            match entry {
                Value::Set(set) => Ok(members.iter().filter(|m| set.insert((*m).clone())).count()),
                _ => Err(wrong_type(key)),
            }
        });
        async move { result }
    }

    fn replace_set(&self, key: &str, members: &[String]) -> impl Future<Output = Result<usize>> + Send {
        let result = self.with_state(|state| {
            if !matches!(state.entries.get(key), None | Some(Value::Set(_))) {
                return Err(wrong_type(key));
            }
            let set: HashSet<String> = members.iter().cloned().collect();
            let count = set.len();
            if set.is_empty() {
                state.entries.remove(key);
            } else {
                state.entries.insert(key.to_string(), Value::Set(set));
            }
            Ok(count)
        });
        async move { result }
    }

    fn srem(&self, key: &str, member: &str) -> impl Future<Output = Result<bool>> + Send {
        let result = self.with_state(|state| match state.entries.get_mut(key) {
            Some(Value::Set(set)) => {
                let removed = set.remove(member);
                if set.is_empty() {
                    state.entries.remove(key);
                }
                Ok(removed)
            }
            Some(_) => Err(wrong_type(key)),
            None => Ok(false),
        });
        async move { result }
    }

    fn scard(&self, key: &str) -> impl Future<Output = Result<usize>> + Send {
        let result = self.with_state(|state| match state.entries.get(key) {
            Some(Value::Set(set)) => Ok(set.len()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        });
        async move { result }
    }

    fn hset(&self, key: &str, fields: &[(String, String)]) -> impl Future<Output = Result<()>> + Send {
        let result = self.with_state(|state| {
            let entry = state
                .entries
                .entry(key.to_string())
                .or_insert_with(|| Value::Hash(HashMap::new()));
            match entry {
                Value::Hash(hash) => {
                    hash.extend(fields.iter().cloned());
                    Ok(())
                }
                _ => Err(wrong_type(key)),
            }
        });
        async move { result }
    }

    fn hgetall(&self, key: &str) -> impl Future<Output = Result<HashMap<String, String>>> + Send {
        let result = self.with_state(|state| match state.entries.get(key) {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(HashMap::new()),
        });
        async move { result }
    }

    fn del(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        let result = self.with_state(|state| Ok(state.entries.remove(key).is_some()));
        async move { result }
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        let result = self.with_state(|state| Ok(state.entries.contains_key(key)));
        async move { result }
    }

    fn keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> + Send {
        let result = self.with_state(|state| {
            let mut keys: Vec<String> = state
                .entries
                .keys()
                .filter(|key| glob_match(pattern, key))
                .cloned()
                .collect();
            keys.sort();
            Ok(keys)
        });
        async move { result }
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        let result = self.with_state(|state| match state.entries.get(key) {
            Some(Value::Text(value, _)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        });
        async move { result }
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<()>> + Send {
        let result = self.with_state(|state| {
            state.entries.insert(
                key.to_string(),
                Value::Text(value.to_string(), Some(Instant::now() + ttl)),
            );
            Ok(())
        });
        async move { result }
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<bool>> + Send {
        let result = self.with_state(|state| {
            if state.entries.contains_key(key) {
                return Ok(false);
            }
            state.entries.insert(
                key.to_string(),
                Value::Text(value.to_string(), Some(Instant::now() + ttl)),
            );
            Ok(true)
        });
        async move { result }
    }

    fn ping(&self) -> impl Future<Output = Result<()>> + Send {
        let result = self.guard();
        async move { result }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_prefix_and_suffix() {
        assert!(glob_match("twitch:active-stream/*", "twitch:active-stream/nyx/200"));
        assert!(glob_match("twitch:active-stream/nyx/*", "twitch:active-stream/nyx/200"));
        assert!(!glob_match("twitch:active-stream/nyx/*", "twitch:active-stream/nyxie/200"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(glob_match("exact", "exact"));
    }

    #[tokio::test]
    async fn sets_are_idempotent() {
        let store = InMemoryEphemeralStore::new();
        let added = store.sadd("s", &["a".into(), "b".into(), "a".into()]).await.unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.sadd("s", &["a".into()]).await.unwrap(), 0);
        assert!(store.srem("s", "a").await.unwrap());
        assert!(!store.srem("s", "a").await.unwrap());
        assert_eq!(store.scard("s").await.unwrap(), 1);
        assert_eq!(store.scard("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replace_set_swaps_every_member() {
        let store = InMemoryEphemeralStore::new();
        store.sadd("s", &["stale".into(), "a".into()]).await.unwrap();

        let count = store.replace_set("s", &["a".into(), "b".into(), "b".into()]).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.members("s").unwrap(), HashSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(store.replace_set("s", &[]).await.unwrap(), 0);
        assert!(!store.exists("s").await.unwrap());
    }

    #[tokio::test]
    async fn set_nx_only_writes_once() {
        let store = InMemoryEphemeralStore::new();
        assert!(store.set_nx_ex("claim", "a", Duration::from_secs(60)).await.unwrap());
        assert!(!store.set_nx_ex("claim", "b", Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.get("claim").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn expired_values_disappear() {
        let store = InMemoryEphemeralStore::new();
        store.set_ex("k", "v", Duration::ZERO).await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn outage_surfaces_as_cache_error() {
        let store = InMemoryEphemeralStore::new();
        store.set_unavailable(true);
        let err = store.scard("s").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
