//! Mock configuration store.

use super::lock;
use herald_core::model::SettingKey;
use herald_core::providers::ConfigurationStore;
use herald_core::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock configuration store.
///
/// Counts reads so tests can assert the read-through cache absorbs them.
#[derive(Debug, Clone, Default)]
pub struct MockConfigurationStore {
    settings: Arc<Mutex<HashMap<(String, SettingKey), String>>>,
    reads: Arc<AtomicUsize>,
}

impl MockConfigurationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ConfigurationStore for MockConfigurationStore {
    fn get(&self, guild_id: &str, key: SettingKey) -> impl Future<Output = Result<Option<String>>> + Send {
        let settings = Arc::clone(&self.settings);
        let reads = Arc::clone(&self.reads);
        let guild_id = guild_id.to_string();

        async move {
            reads.fetch_add(1, Ordering::SeqCst);
            Ok(lock(&settings)?.get(&(guild_id, key)).cloned())
        }
    }

    fn set(&self, guild_id: &str, key: SettingKey, value: &str) -> impl Future<Output = Result<()>> + Send {
        let settings = Arc::clone(&self.settings);
        let guild_id = guild_id.to_string();
        let value = value.to_string();

        async move {
            lock(&settings)?.insert((guild_id, key), value);
            Ok(())
        }
    }
}
