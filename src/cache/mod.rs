//! Banner content cache.
//!
//! Two tiers sit behind the [`ContentCache`](crate::application::repos::ContentCache) port:
//!
//! - **Local**: bounded in-process LRU, entries expire after the configured TTL
//! - **Remote**: shared Redis store, same TTL, consulted on a local miss
//!
//! ```toml
//! [cache]
//! local_capacity = 100
//! ttl_seconds = 300
//! ```

mod config;
mod keys;
mod lock;
mod remote;
mod store;
mod tiered;

pub use config::CacheConfig;
pub use keys::remote_key;
pub use remote::{RedisStore, RemoteStore};
pub use store::LocalStore;
pub use tiered::{METRIC_ERROR, METRIC_LOCAL_HIT, METRIC_MISS, METRIC_REMOTE_HIT, TieredContentCache};
