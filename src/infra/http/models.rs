use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::banners::{BannerRecordExt, HistoryEntry};

#[derive(Debug, Deserialize)]
pub struct UserBannerQuery {
    pub feature_id: i32,
    pub tag_id: i32,
    #[serde(default)]
    pub use_last_revision: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct BannerListQuery {
    pub feature_id: Option<i32>,
    pub tag_id: Option<i32>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BannerSelectorQuery {
    pub feature_id: Option<i32>,
    pub tag_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub version: i32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BannerCreateRequest {
    pub feature_id: i32,
    pub tag_ids: Vec<i32>,
    pub content: Map<String, Value>,
    pub is_active: bool,
}

/// Partial update; an absent field is left unchanged.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BannerUpdateRequest {
    pub feature_id: Option<i32>,
    pub tag_ids: Option<Vec<i32>>,
    pub content: Option<Map<String, Value>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BannerIdResponse {
    pub banner_id: i32,
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub banner_id: i32,
    pub feature_id: i32,
    pub tag_ids: Vec<i32>,
    pub content: Map<String, Value>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<BannerRecordExt> for BannerResponse {
    fn from(banner: BannerRecordExt) -> Self {
        Self {
            banner_id: banner.id,
            feature_id: banner.record.feature_id,
            tag_ids: banner.record.tag_ids,
            content: banner.record.content.into_inner(),
            is_active: banner.record.is_active,
            created_at: banner.created_at,
            updated_at: banner.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BannerVersionResponse {
    pub version: i32,
    pub feature_id: i32,
    pub tag_ids: Vec<i32>,
    pub content: Map<String, Value>,
}

impl From<HistoryEntry> for BannerVersionResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            version: entry.version,
            feature_id: entry.feature_id,
            tag_ids: entry.tag_ids,
            content: entry.content.into_inner(),
        }
    }
}
