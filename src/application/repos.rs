//! Ports consumed by the banner service: durable storage and the content cache.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::banners::{
    BannerListOptions, BannerPatch, BannerRecord, BannerRecordExt, DeleteSelector, HistoryEntry,
    IdentKey, UserContent,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("remote cache unavailable: {0}")]
    Remote(String),
    #[error("cached value could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::Remote(err.to_string())
    }
}

/// Durable banner storage with per-banner version history.
#[async_trait]
pub trait BannerStore: Send + Sync {
    /// Insert a banner together with its activity marker. Returns the new id.
    async fn add(&self, record: &BannerRecord) -> Result<i32, RepoError>;

    /// Apply the supplied fields of `patch`; `NotFound` when `id` is unknown.
    async fn update(&self, id: i32, patch: &BannerPatch) -> Result<(), RepoError>;

    async fn list(&self, options: &BannerListOptions) -> Result<Vec<BannerRecordExt>, RepoError>;

    /// Delete exactly `ids`; `NotFound` when nothing was removed.
    async fn delete_by_ids(&self, ids: &[i32]) -> Result<(), RepoError>;

    /// Resolve `selector` to ids and delete them; `NotFound` when it matches nothing.
    async fn delete_by_selector(&self, selector: DeleteSelector) -> Result<(), RepoError>;

    async fn history(&self, id: i32) -> Result<Vec<HistoryEntry>, RepoError>;

    /// Restore `version` of banner `id` as its live content.
    async fn select_version(&self, id: i32, version: i32) -> Result<(), RepoError>;
}

/// Cache of user-visible content keyed by `(feature, tag)`.
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// `Ok(None)` is a miss on every tier; `Err` is a failure distinct from a miss.
    async fn get(&self, key: &IdentKey) -> Result<Option<UserContent>, CacheError>;

    async fn put(&self, key: &IdentKey, content: &UserContent) -> Result<(), CacheError>;
}
