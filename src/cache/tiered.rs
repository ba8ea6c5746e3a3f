//! Two-tier content cache: in-process LRU in front of the shared remote store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::debug;

use crate::application::repos::{CacheError, ContentCache};
use crate::domain::banners::{IdentKey, UserContent};

use super::config::CacheConfig;
use super::keys::remote_key;
use super::remote::RemoteStore;
use super::store::LocalStore;

pub const METRIC_LOCAL_HIT: &str = "bannerflow_cache_local_hit_total";
pub const METRIC_REMOTE_HIT: &str = "bannerflow_cache_remote_hit_total";
pub const METRIC_MISS: &str = "bannerflow_cache_miss_total";
pub const METRIC_ERROR: &str = "bannerflow_cache_error_total";

pub struct TieredContentCache {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    ttl: Duration,
}

impl TieredContentCache {
    pub fn new(config: &CacheConfig, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            local: LocalStore::new(config),
            remote,
            ttl: config.ttl(),
        }
    }

    /// Cache that never leaves the process.
    pub fn local_only(config: &CacheConfig) -> Self {
        Self::new(config, None)
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    async fn get_remote(
        &self,
        remote: &dyn RemoteStore,
        key: &IdentKey,
    ) -> Result<Option<UserContent>, CacheError> {
        let Some(raw) = remote.get(&remote_key(key)).await? else {
            return Ok(None);
        };
        let content: UserContent = serde_json::from_str(&raw)?;
        Ok(Some(content))
    }
}

#[async_trait]
impl ContentCache for TieredContentCache {
    async fn get(&self, key: &IdentKey) -> Result<Option<UserContent>, CacheError> {
        if let Some(content) = self.local.get(key) {
            counter!(METRIC_LOCAL_HIT).increment(1);
            return Ok(Some(content));
        }

        let Some(remote) = self.remote.as_deref() else {
            counter!(METRIC_MISS).increment(1);
            return Ok(None);
        };

        match self.get_remote(remote, key).await {
            Ok(Some(content)) => {
                counter!(METRIC_REMOTE_HIT).increment(1);
                self.local.put(*key, content.clone());
                Ok(Some(content))
            }
            Ok(None) => {
                counter!(METRIC_MISS).increment(1);
                Ok(None)
            }
            Err(err) => {
                counter!(METRIC_ERROR, "op" => "get").increment(1);
                Err(err)
            }
        }
    }

    async fn put(&self, key: &IdentKey, content: &UserContent) -> Result<(), CacheError> {
        self.local.put(*key, content.clone());

        let Some(remote) = self.remote.as_deref() else {
            return Ok(());
        };

        let value = serde_json::to_string(content)?;
        let result = remote.set(&remote_key(key), value, self.ttl).await;
        if result.is_err() {
            counter!(METRIC_ERROR, "op" => "put").increment(1);
        } else {
            debug!(
                feature_id = key.feature_id,
                tag_id = key.tag_id,
                "Stored banner content in remote cache"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Map, Value};

    use super::*;

    #[derive(Default)]
    struct MemoryRemote {
        values: Mutex<HashMap<String, (String, Duration)>>,
        gets: AtomicUsize,
        fail: bool,
    }

    impl MemoryRemote {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MemoryRemote {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CacheError::remote("connection refused"));
            }
            let values = self.values.lock().expect("remote lock");
            Ok(values.get(key).map(|(value, _)| value.clone()))
        }

        async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
            if self.fail {
                return Err(CacheError::remote("connection refused"));
            }
            self.values
                .lock()
                .expect("remote lock")
                .insert(key.to_string(), (value, ttl));
            Ok(())
        }
    }

    fn content(title: &str) -> UserContent {
        let mut map = Map::new();
        map.insert("title".to_string(), Value::String(title.to_string()));
        UserContent::new(map)
    }

    #[tokio::test]
    async fn miss_on_both_tiers_is_not_an_error() {
        let remote = Arc::new(MemoryRemote::default());
        let cache = TieredContentCache::new(&CacheConfig::default(), Some(remote.clone()));

        let result = cache.get(&IdentKey::new(1, 1)).await.expect("get");
        assert!(result.is_none());
        assert_eq!(remote.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn put_writes_through_both_tiers_with_ttl() {
        let remote = Arc::new(MemoryRemote::default());
        let config = CacheConfig {
            ttl_secs: 42,
            ..Default::default()
        };
        let cache = TieredContentCache::new(&config, Some(remote.clone()));
        let key = IdentKey::new(3, 9);

        cache.put(&key, &content("x")).await.expect("put");

        assert_eq!(cache.local().get(&key), Some(content("x")));
        let values = remote.values.lock().expect("remote lock");
        let (raw, ttl) = values.get("feature: 3, tag: 9").expect("remote entry");
        assert_eq!(raw, r#"{"title":"x"}"#);
        assert_eq!(*ttl, Duration::from_secs(42));
    }

    #[tokio::test]
    async fn remote_hit_backfills_local_tier() {
        let remote = Arc::new(MemoryRemote::default());
        remote.values.lock().expect("remote lock").insert(
            "feature: 1, tag: 2".to_string(),
            (r#"{"title":"shared"}"#.to_string(), Duration::from_secs(60)),
        );
        let cache = TieredContentCache::new(&CacheConfig::default(), Some(remote.clone()));
        let key = IdentKey::new(1, 2);

        assert_eq!(cache.get(&key).await.expect("get"), Some(content("shared")));
        assert_eq!(cache.get(&key).await.expect("get"), Some(content("shared")));
        assert_eq!(remote.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_failure_is_distinct_from_miss() {
        let cache = TieredContentCache::new(
            &CacheConfig::default(),
            Some(Arc::new(MemoryRemote::failing())),
        );
        let key = IdentKey::new(1, 1);

        assert!(matches!(
            cache.get(&key).await,
            Err(CacheError::Remote(_))
        ));
        assert!(cache.put(&key, &content("x")).await.is_err());
        // The local tier still took the write.
        assert_eq!(cache.get(&key).await.expect("local hit"), Some(content("x")));
    }

    #[tokio::test]
    async fn undecodable_remote_value_is_an_error() {
        let remote = Arc::new(MemoryRemote::default());
        remote.values.lock().expect("remote lock").insert(
            "feature: 1, tag: 1".to_string(),
            ("not json".to_string(), Duration::from_secs(60)),
        );
        let cache = TieredContentCache::new(&CacheConfig::default(), Some(remote));

        assert!(matches!(
            cache.get(&IdentKey::new(1, 1)).await,
            Err(CacheError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn local_only_cache_serves_its_own_writes() {
        let cache = TieredContentCache::local_only(&CacheConfig::default());
        let key = IdentKey::new(5, 5);
        assert!(cache.get(&key).await.expect("get").is_none());
        cache.put(&key, &content("x")).await.expect("put");
        assert_eq!(cache.get(&key).await.expect("get"), Some(content("x")));
    }
}
