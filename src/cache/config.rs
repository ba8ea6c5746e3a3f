//! Content cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_LOCAL_CAPACITY: usize = 100;
const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries held by the in-process tier.
    pub local_capacity: usize,
    /// Lifetime of an entry in both tiers.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: DEFAULT_LOCAL_CAPACITY,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            local_capacity: settings.local_capacity.get(),
            ttl_secs: settings.ttl_secs.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the local capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn local_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.local_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Entry lifetime, never shorter than one second.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.max(1))
    }
}
