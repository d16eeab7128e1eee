//! Read-through cache over the ephemeral store.
//!
//! One helper serves every cached lookup: a hit is returned as is, a miss is
//! loaded from the durable source and written back with a TTL. The cache is
//! advisory; when the ephemeral store fails the loader answers directly.

use crate::keys;
use herald_core::model::SettingKey;
use herald_core::providers::{ConfigurationStore, EphemeralStore};
use herald_core::Result;
use herald_runtime::metrics::CacheMetrics;
use std::future::Future;
use std::time::Duration;

/// Look `key` up in `store`, falling back to `loader` on a miss.
///
/// `None` from the loader is not cached, so a setting that appears later is
/// picked up on the next call.
///
/// # Errors
///
/// Returns the loader's error; store failures are logged and bypassed.
pub async fn read_through<E, F, Fut>(store: &E, key: &str, ttl: Duration, loader: F) -> Result<Option<String>>
where
    E: EphemeralStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    match store.get(key).await {
        Ok(Some(value)) => {
            CacheMetrics::record_hit();
            return Ok(Some(value));
        }
        Ok(None) => CacheMetrics::record_miss(),
        Err(e) => {
            CacheMetrics::record_error();
            tracing::warn!(key, error = %e, "Cache read failed, using durable store");
        }
    }

    let loaded = loader().await?;
    if let Some(value) = &loaded {
        if let Err(e) = store.set_ex(key, value, ttl).await {
            tracing::warn!(key, error = %e, "Failed to repopulate cache");
        }
    }
    Ok(loaded)
}

/// Read a tenant setting through the cache.
///
/// # Errors
///
/// Returns error if the configuration store fails.
pub async fn read_setting<C, E>(
    settings: &C,
    store: &E,
    ttl: Duration,
    guild_id: &str,
    key: SettingKey,
) -> Result<Option<String>>
where
    C: ConfigurationStore,
    E: EphemeralStore,
{
    let cache_key = keys::guild_setting(guild_id, key.as_str());
    read_through(store, &cache_key, ttl, || settings.get(guild_id, key)).await
}

/// Parse a threshold setting, falling back to `default` when unset or invalid.
#[must_use]
pub fn threshold(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use herald_testing::mocks::{InMemoryEphemeralStore, MockConfigurationStore};

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn second_read_is_served_from_the_cache() {
        let settings = MockConfigurationStore::new();
        let store = InMemoryEphemeralStore::new();
        settings.set("g1", SettingKey::StarboardCount, "5").await.unwrap();

        let first = read_setting(&settings, &store, TTL, "g1", SettingKey::StarboardCount).await.unwrap();
        let second = read_setting(&settings, &store, TTL, "g1", SettingKey::StarboardCount).await.unwrap();

        assert_eq!(first.as_deref(), Some("5"));
        assert_eq!(second.as_deref(), Some("5"));
        assert_eq!(settings.reads(), 1);
        assert_eq!(
            store.get("guild-settings:g1/starboard-count").await.unwrap().as_deref(),
            Some("5")
        );
    }

    #[tokio::test]
    async fn unset_values_are_not_cached() {
        let settings = MockConfigurationStore::new();
        let store = InMemoryEphemeralStore::new();

        assert!(read_setting(&settings, &store, TTL, "g1", SettingKey::StarboardChannel).await.unwrap().is_none());
        settings.set("g1", SettingKey::StarboardChannel, "500").await.unwrap();
        let value = read_setting(&settings, &store, TTL, "g1", SettingKey::StarboardChannel).await.unwrap();

        assert_eq!(value.as_deref(), Some("500"));
        assert_eq!(settings.reads(), 2);
    }

    #[tokio::test]
    async fn store_outage_falls_back_to_the_loader() {
        let store = InMemoryEphemeralStore::new();
        store.set_unavailable(true);

        let value = read_through(&store, "k", TTL, || async { Ok(Some("v".to_string())) })
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("v"));
    }

    #[test]
    fn threshold_falls_back_on_garbage() {
        assert_eq!(threshold(Some("5"), 3), 5);
        assert_eq!(threshold(Some(" 7 "), 3), 7);
        assert_eq!(threshold(Some("lots"), 3), 3);
        assert_eq!(threshold(None, 3), 3);
    }
}
