//! Banner records and the selectors used to address them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::error::DomainError;
use crate::domain::mask::UpdateMask;

/// Fully-specified `(feature, tag)` pair addressing one visible banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentKey {
    pub feature_id: i32,
    pub tag_id: i32,
}

impl IdentKey {
    pub fn new(feature_id: i32, tag_id: i32) -> Self {
        Self { feature_id, tag_id }
    }
}

/// Selector where an unset field matches any value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerSelector {
    pub feature_id: Option<i32>,
    pub tag_id: Option<i32>,
}

impl BannerSelector {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn feature(feature_id: i32) -> Self {
        Self {
            feature_id: Some(feature_id),
            tag_id: None,
        }
    }

    pub fn tag(tag_id: i32) -> Self {
        Self {
            feature_id: None,
            tag_id: Some(tag_id),
        }
    }

    /// Build a selector from raw ids where negative values mean "unset".
    pub fn from_raw(feature_id: i32, tag_id: i32) -> Self {
        Self {
            feature_id: (feature_id >= 0).then_some(feature_id),
            tag_id: (tag_id >= 0).then_some(tag_id),
        }
    }
}

impl From<IdentKey> for BannerSelector {
    fn from(key: IdentKey) -> Self {
        Self {
            feature_id: Some(key.feature_id),
            tag_id: Some(key.tag_id),
        }
    }
}

/// Group of banners removed by a bulk delete. Exactly one dimension is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteSelector {
    ByFeature(i32),
    ByTag(i32),
}

impl TryFrom<BannerSelector> for DeleteSelector {
    type Error = DomainError;

    fn try_from(selector: BannerSelector) -> Result<Self, Self::Error> {
        match (selector.feature_id, selector.tag_id) {
            (Some(feature_id), None) => Ok(Self::ByFeature(feature_id)),
            (None, Some(tag_id)) => Ok(Self::ByTag(tag_id)),
            (Some(_), Some(_)) => Err(DomainError::validation(
                "delete selector must not set both feature_id and tag_id",
            )),
            (None, None) => Err(DomainError::validation(
                "delete selector requires feature_id or tag_id",
            )),
        }
    }
}

impl std::fmt::Display for DeleteSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByFeature(id) => write!(f, "feature {id}"),
            Self::ByTag(id) => write!(f, "tag {id}"),
        }
    }
}

/// User-visible banner payload. Opaque to everything but the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserContent(pub Map<String, Value>);

impl UserContent {
    pub fn new(content: Map<String, Value>) -> Self {
        Self(content)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for UserContent {
    fn from(content: Map<String, Value>) -> Self {
        Self(content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerRecord {
    pub feature_id: i32,
    pub tag_ids: Vec<i32>,
    pub content: UserContent,
    pub is_active: bool,
}

impl BannerRecord {
    /// Build a record with its tag set normalised (sorted, de-duplicated).
    pub fn new(feature_id: i32, tag_ids: Vec<i32>, content: UserContent, is_active: bool) -> Self {
        Self {
            feature_id,
            tag_ids: normalize_tags(tag_ids),
            content,
            is_active,
        }
    }

    /// True when this record is served for `key`.
    pub fn is_visible_for(&self, key: &IdentKey) -> bool {
        self.is_active && self.feature_id == key.feature_id && self.tag_ids.contains(&key.tag_id)
    }
}

/// Partial banner update; `Some` marks a supplied field, including explicit clears.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannerPatch {
    pub feature_id: Option<i32>,
    pub tag_ids: Option<Vec<i32>>,
    pub content: Option<UserContent>,
    pub is_active: Option<bool>,
}

impl BannerPatch {
    pub fn mask(&self) -> UpdateMask {
        let mut mask = UpdateMask::empty();
        if self.feature_id.is_some() {
            mask.insert(UpdateMask::FEATURE);
        }
        if self.tag_ids.is_some() {
            mask.insert(UpdateMask::TAG);
        }
        if self.content.is_some() {
            mask.insert(UpdateMask::CONTENT);
        }
        if self.is_active.is_some() {
            mask.insert(UpdateMask::ACTIVE);
        }
        mask
    }

    /// Apply the supplied fields to `record`, leaving the rest untouched.
    pub fn apply_to(&self, record: &mut BannerRecord) {
        if let Some(feature_id) = self.feature_id {
            record.feature_id = feature_id;
        }
        if let Some(tag_ids) = self.tag_ids.as_ref() {
            record.tag_ids = normalize_tags(tag_ids.clone());
        }
        if let Some(content) = self.content.as_ref() {
            record.content = content.clone();
        }
        if let Some(is_active) = self.is_active {
            record.is_active = is_active;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BannerRecordExt {
    pub id: i32,
    #[serde(flatten)]
    pub record: BannerRecord,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub version: i32,
    pub feature_id: i32,
    pub tag_ids: Vec<i32>,
    pub content: UserContent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BannerListOptions {
    pub selector: BannerSelector,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl BannerListOptions {
    pub fn unbounded(selector: BannerSelector) -> Self {
        Self {
            selector,
            limit: None,
            offset: None,
        }
    }
}

fn normalize_tags(mut tag_ids: Vec<i32>) -> Vec<i32> {
    tag_ids.sort_unstable();
    tag_ids.dedup();
    tag_ids
}
