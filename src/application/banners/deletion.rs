//! Background worker draining bulk delete requests.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{debug, info, warn};

use crate::application::repos::{BannerStore, RepoError};
use crate::domain::banners::DeleteSelector;

use super::admission::AdmissionCounter;

pub const METRIC_BULK_DELETE: &str = "bannerflow_bulk_delete_total";

/// An accepted bulk delete. Holds a tracker token until the worker is done with it.
pub(crate) struct DeletionTask {
    pub selector: DeleteSelector,
    pub _token: TaskTrackerToken,
}

pub(crate) struct DeletionWorker {
    pub store: Arc<dyn BannerStore>,
    pub admission: AdmissionCounter,
    pub ceiling: usize,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub shutdown: CancellationToken,
}

impl DeletionWorker {
    pub async fn run(self, mut rx: mpsc::Receiver<DeletionTask>) {
        loop {
            let task = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                task = rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            if !self.wait_for_admission().await {
                break;
            }
            self.process(task.selector).await;
        }
        debug!("Bulk deletion worker stopped");
    }

    /// Poll until foreground load drops under the ceiling. `false` when shut down meanwhile.
    async fn wait_for_admission(&self) -> bool {
        loop {
            let in_flight = self.admission.current();
            if in_flight < self.ceiling {
                return true;
            }
            debug!(
                in_flight,
                ceiling = self.ceiling,
                "Bulk deletion waiting for foreground load to drop"
            );
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    async fn process(&self, selector: DeleteSelector) {
        let outcome = match timeout(self.timeout, self.store.delete_by_selector(selector)).await {
            Ok(Ok(())) => {
                info!(%selector, "Bulk deletion completed");
                "deleted"
            }
            Ok(Err(RepoError::NotFound)) => {
                info!(%selector, "Bulk deletion matched no banners");
                "empty"
            }
            Ok(Err(err)) => {
                warn!(%selector, error = %err, "Bulk deletion failed");
                "failed"
            }
            Err(_) => {
                warn!(
                    %selector,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Bulk deletion timed out"
                );
                "timed_out"
            }
        };
        counter!(METRIC_BULK_DELETE, "outcome" => outcome).increment(1);
    }
}
