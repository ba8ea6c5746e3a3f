use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::application::repos::{BannerStore, ContentCache, RepoError};
use crate::domain::banners::{
    BannerListOptions, BannerPatch, BannerRecord, BannerRecordExt, BannerSelector, DeleteSelector,
    HistoryEntry, IdentKey, UserContent,
};
use crate::domain::error::DomainError;

use super::admission::{AdmissionCounter, AdmissionGuard};
use super::config::ServiceConfig;
use super::deletion::{DeletionTask, DeletionWorker};
use super::error::BannerError;

/// Outcome of one collaborator call raced against cancellation and the deadline.
enum CallError<E> {
    Cancelled,
    TimedOut,
    Failed(E),
}

/// Orchestrates banner reads and writes over the durable store and the content cache.
///
/// Every foreground operation is counted by the admission counter while it works
/// against the collaborators. A bulk delete leaves the count before it waits
/// for queue space. Operations fail fast when the caller's token is already
/// cancelled, and each collaborator call is bounded by the configured timeout.
#[derive(Clone)]
pub struct BannerService {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn BannerStore>,
    cache: Arc<dyn ContentCache>,
    config: ServiceConfig,
    admission: AdmissionCounter,
    tasks: TaskTracker,
    deletions: mpsc::Sender<DeletionTask>,
    shutdown: CancellationToken,
}

impl BannerService {
    /// Build the service and start its bulk deletion worker. Must run inside a Tokio runtime.
    pub fn new(
        store: Arc<dyn BannerStore>,
        cache: Arc<dyn ContentCache>,
        config: ServiceConfig,
    ) -> Self {
        let (deletions, rx) = mpsc::channel(config.deletion_queue_capacity.get());
        let admission = AdmissionCounter::new();
        let shutdown = CancellationToken::new();

        let worker = DeletionWorker {
            store: Arc::clone(&store),
            admission: admission.clone(),
            ceiling: config.admission_ceiling.get(),
            poll_interval: config.admission_poll_interval,
            timeout: config.timeout,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(worker.run(rx));

        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                config,
                admission,
                tasks: TaskTracker::new(),
                deletions,
                shutdown,
            }),
        }
    }

    /// Number of foreground operations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.admission.current()
    }

    /// Background cache writes and queued bulk deletions not yet finished.
    pub fn pending_background(&self) -> usize {
        self.inner.tasks.len()
    }

    pub async fn create_banner(
        &self,
        cancel: &CancellationToken,
        record: BannerRecord,
    ) -> Result<i32, BannerError> {
        let (_guard, deadline) = self.begin("create_banner", cancel)?;
        let id = self
            .call(cancel, deadline, self.inner.store.add(&record))
            .await
            .map_err(|err| {
                classify("create_banner", err, |err| match err {
                    RepoError::Duplicate { .. } => Some(BannerError::Conflict),
                    _ => None,
                })
            })?;
        info!(op = "create_banner", banner_id = id, "Banner created");
        Ok(id)
    }

    /// Apply the fields supplied in `patch`. A patch supplying nothing is rejected up front.
    pub async fn update_banner(
        &self,
        cancel: &CancellationToken,
        id: i32,
        patch: BannerPatch,
    ) -> Result<(), BannerError> {
        let (_guard, deadline) = self.begin("update_banner", cancel)?;
        if patch.mask().is_empty() {
            return Err(DomainError::EmptyUpdate.into());
        }
        self.call(cancel, deadline, self.inner.store.update(id, &patch))
            .await
            .map_err(|err| classify("update_banner", err, not_found))?;
        info!(op = "update_banner", banner_id = id, mask = ?patch.mask(), "Banner updated");
        Ok(())
    }

    pub async fn delete_banner(
        &self,
        cancel: &CancellationToken,
        id: i32,
    ) -> Result<(), BannerError> {
        let (_guard, deadline) = self.begin("delete_banner", cancel)?;
        self.call(cancel, deadline, self.inner.store.delete_by_ids(&[id]))
            .await
            .map_err(|err| classify("delete_banner", err, not_found))?;
        info!(op = "delete_banner", banner_id = id, "Banner deleted");
        Ok(())
    }

    /// Queue a bulk delete and return once it is accepted.
    ///
    /// Blocks while the queue is full. The deletion itself runs later on the
    /// background worker; its outcome is only logged.
    pub async fn delete_banners_by_selector(
        &self,
        cancel: &CancellationToken,
        selector: BannerSelector,
    ) -> Result<(), BannerError> {
        let (guard, deadline) = self.begin("delete_banners_by_selector", cancel)?;
        let selector = DeleteSelector::try_from(selector)?;
        // Waiting for queue space is not foreground load: the worker only frees
        // a slot once the counter is under the ceiling.
        drop(guard);
        let permit = self
            .call(cancel, deadline, self.inner.deletions.reserve())
            .await
            .map_err(|err| classify("delete_banners_by_selector", err, |_| None))?;
        permit.send(DeletionTask {
            selector,
            _token: self.inner.tasks.token(),
        });
        debug!(op = "delete_banners_by_selector", %selector, "Bulk deletion queued");
        Ok(())
    }

    pub async fn list_banners(
        &self,
        cancel: &CancellationToken,
        options: BannerListOptions,
    ) -> Result<Vec<BannerRecordExt>, BannerError> {
        let (_guard, deadline) = self.begin("list_banners", cancel)?;
        self.call(cancel, deadline, self.inner.store.list(&options))
            .await
            .map_err(|err| classify("list_banners", err, |_| None))
    }

    /// Serve the active content for `key`, from cache unless `use_last_revision` is set.
    ///
    /// A store read schedules a tracked background write of the result into the
    /// cache and returns without waiting for it.
    pub async fn get_user_banner(
        &self,
        cancel: &CancellationToken,
        key: IdentKey,
        use_last_revision: bool,
    ) -> Result<UserContent, BannerError> {
        let (_guard, deadline) = self.begin("get_user_banner", cancel)?;

        if !use_last_revision {
            let cache_deadline =
                deadline.min(Instant::now() + self.inner.config.cache_read_timeout);
            match self
                .call(cancel, cache_deadline, self.inner.cache.get(&key))
                .await
            {
                Ok(Some(content)) => return Ok(content),
                Ok(None) => {
                    debug!(
                        op = "get_user_banner",
                        feature_id = key.feature_id,
                        tag_id = key.tag_id,
                        "Cache miss"
                    );
                }
                Err(CallError::Failed(err)) => {
                    warn!(op = "get_user_banner", error = %err, "Cache read failed, falling back to store");
                }
                Err(CallError::TimedOut) => {
                    warn!(op = "get_user_banner", "Cache read timed out, falling back to store");
                }
                Err(CallError::Cancelled) => {
                    debug!(op = "get_user_banner", "Caller cancelled");
                    return Err(BannerError::Internal);
                }
            }
        }

        let options = BannerListOptions::unbounded(key.into());
        let records = self
            .call(cancel, deadline, self.inner.store.list(&options))
            .await
            .map_err(|err| classify("get_user_banner", err, |_| None))?;

        let content = match records.into_iter().next() {
            Some(banner) if banner.record.is_visible_for(&key) => banner.record.content,
            _ => {
                debug!(
                    op = "get_user_banner",
                    feature_id = key.feature_id,
                    tag_id = key.tag_id,
                    "No active banner"
                );
                return Err(BannerError::NotFound);
            }
        };

        self.spawn_cache_fill(key, content.clone());
        Ok(content)
    }

    pub async fn select_banner_version(
        &self,
        cancel: &CancellationToken,
        id: i32,
        version: i32,
    ) -> Result<(), BannerError> {
        let (_guard, deadline) = self.begin("select_banner_version", cancel)?;
        self.call(cancel, deadline, self.inner.store.select_version(id, version))
            .await
            .map_err(|err| classify("select_banner_version", err, |_| None))?;
        info!(
            op = "select_banner_version",
            banner_id = id,
            version,
            "Banner version activated"
        );
        Ok(())
    }

    pub async fn list_banner_history(
        &self,
        cancel: &CancellationToken,
        id: i32,
    ) -> Result<Vec<HistoryEntry>, BannerError> {
        let (_guard, deadline) = self.begin("list_banner_history", cancel)?;
        let history = self
            .call(cancel, deadline, self.inner.store.history(id))
            .await
            .map_err(|err| classify("list_banner_history", err, |_| None))?;
        if history.is_empty() {
            return Err(BannerError::NotFound);
        }
        Ok(history)
    }

    /// Wait up to `deadline` for background cache writes and queued bulk deletions.
    ///
    /// On success the deletion worker is stopped. Operations issued after `stop`
    /// are still served but no longer waited for by a later call.
    pub async fn stop(&self, deadline: Duration) -> Result<(), BannerError> {
        let tasks = &self.inner.tasks;
        tasks.close();
        info!(pending = tasks.len(), "Stopping banner service");

        match timeout(deadline, tasks.wait()).await {
            Ok(()) => {
                self.inner.shutdown.cancel();
                info!("Banner service stopped");
                Ok(())
            }
            Err(_) => {
                warn!(
                    pending = tasks.len(),
                    deadline_ms = deadline.as_millis() as u64,
                    "Background work did not drain before the deadline"
                );
                Err(BannerError::DeadlineExceeded)
            }
        }
    }

    fn begin(
        &self,
        op: &'static str,
        cancel: &CancellationToken,
    ) -> Result<(AdmissionGuard, Instant), BannerError> {
        let guard = self.inner.admission.enter();
        if cancel.is_cancelled() {
            debug!(op, "Caller cancelled before start");
            return Err(BannerError::Internal);
        }
        Ok((guard, Instant::now() + self.inner.config.timeout))
    }

    async fn call<T, E, F>(
        &self,
        cancel: &CancellationToken,
        deadline: Instant,
        fut: F,
    ) -> Result<T, CallError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CallError::Cancelled),
            result = timeout_at(deadline, fut) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(CallError::Failed(err)),
                Err(_) => Err(CallError::TimedOut),
            },
        }
    }

    fn spawn_cache_fill(&self, key: IdentKey, content: UserContent) {
        let cache = Arc::clone(&self.inner.cache);
        let fill_timeout = self.inner.config.cache_fill_timeout;
        self.inner.tasks.spawn(async move {
            match timeout(fill_timeout, cache.put(&key, &content)).await {
                Ok(Ok(())) => debug!(
                    feature_id = key.feature_id,
                    tag_id = key.tag_id,
                    "Cache populated"
                ),
                Ok(Err(err)) => warn!(
                    feature_id = key.feature_id,
                    tag_id = key.tag_id,
                    error = %err,
                    "Cache population failed"
                ),
                Err(_) => warn!(
                    feature_id = key.feature_id,
                    tag_id = key.tag_id,
                    "Cache population timed out"
                ),
            }
        });
    }
}

fn not_found(err: &RepoError) -> Option<BannerError> {
    matches!(err, RepoError::NotFound).then_some(BannerError::NotFound)
}

/// Map a failed call to the error returned to the caller, logging the detail.
fn classify<E, F>(op: &'static str, err: CallError<E>, known: F) -> BannerError
where
    E: std::fmt::Display,
    F: FnOnce(&E) -> Option<BannerError>,
{
    match err {
        CallError::Cancelled => {
            debug!(op, "Caller cancelled");
            BannerError::Internal
        }
        CallError::TimedOut => {
            warn!(op, "Operation timed out");
            BannerError::Internal
        }
        CallError::Failed(err) => {
            warn!(op, error = %err, "Operation failed");
            known(&err).unwrap_or(BannerError::Internal)
        }
    }
}
