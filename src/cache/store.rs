//! In-process tier: a bounded LRU with per-entry expiry.

use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::domain::banners::{IdentKey, UserContent};

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

struct Entry {
    content: UserContent,
    expires_at: Instant,
}

pub struct LocalStore {
    entries: Mutex<LruCache<IdentKey, Entry>>,
    ttl: Duration,
}

impl LocalStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.local_capacity_non_zero())),
            ttl: config.ttl(),
        }
    }

    /// Returns the live entry for `key`; an expired entry is evicted and reported as absent.
    pub fn get(&self, key: &IdentKey) -> Option<UserContent> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.content.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn put(&self, key: IdentKey, content: UserContent) {
        let entry = Entry {
            content,
            expires_at: Instant::now() + self.ttl,
        };
        mutex_lock(&self.entries, SOURCE, "put").put(key, entry);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
