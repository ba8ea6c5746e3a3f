//! Banner orchestration: cache-aside reads, store writes, and queued bulk deletes.

mod admission;
mod config;
mod deletion;
mod error;
mod service;

pub use admission::{AdmissionCounter, AdmissionGuard};
pub use config::ServiceConfig;
pub use deletion::METRIC_BULK_DELETE;
pub use error::BannerError;
pub use service::BannerService;
