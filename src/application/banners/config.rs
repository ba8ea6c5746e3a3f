use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DELETION_QUEUE_CAPACITY: usize = 100;
const DEFAULT_ADMISSION_CEILING: usize = 200;
const DEFAULT_ADMISSION_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_CACHE_FILL_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Tunables of [`BannerService`](super::BannerService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bound applied to every collaborator call of a foreground operation.
    pub timeout: Duration,
    /// Bulk deletions accepted before enqueueing blocks the caller.
    pub deletion_queue_capacity: NonZeroUsize,
    /// Bulk deletions wait while this many foreground operations are in flight.
    pub admission_ceiling: NonZeroUsize,
    pub admission_poll_interval: Duration,
    /// Bound applied to each background cache write.
    pub cache_fill_timeout: Duration,
    /// Bound on the cache lookup of a user read, so a slow cache leaves time for the store.
    pub cache_read_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            deletion_queue_capacity: NonZeroUsize::new(DEFAULT_DELETION_QUEUE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            admission_ceiling: NonZeroUsize::new(DEFAULT_ADMISSION_CEILING)
                .unwrap_or(NonZeroUsize::MIN),
            admission_poll_interval: DEFAULT_ADMISSION_POLL_INTERVAL,
            cache_fill_timeout: DEFAULT_CACHE_FILL_TIMEOUT,
            cache_read_timeout: DEFAULT_CACHE_READ_TIMEOUT,
        }
    }
}

impl From<&crate::config::ServiceSettings> for ServiceConfig {
    fn from(settings: &crate::config::ServiceSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms.get()),
            deletion_queue_capacity: settings.deletion_queue_capacity,
            admission_ceiling: settings.admission_ceiling,
            admission_poll_interval: Duration::from_millis(settings.admission_poll_interval_ms.get()),
            cache_fill_timeout: Duration::from_millis(settings.cache_fill_timeout_ms.get()),
            cache_read_timeout: Duration::from_millis(settings.cache_read_timeout_ms.get()),
        }
    }
}
