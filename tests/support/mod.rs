//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bannerflow::application::repos::{BannerStore, CacheError, ContentCache, RepoError};
use bannerflow::domain::banners::{
    BannerListOptions, BannerPatch, BannerRecord, BannerRecordExt, DeleteSelector, HistoryEntry,
    IdentKey, UserContent,
};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tokio::sync::Semaphore;

pub fn content(value: Value) -> UserContent {
    match value {
        Value::Object(map) => UserContent::new(map),
        _ => UserContent::new(Map::new()),
    }
}

pub fn record(feature_id: i32, tag_ids: Vec<i32>, is_active: bool) -> BannerRecord {
    BannerRecord::new(
        feature_id,
        tag_ids,
        content(json!({ "title": format!("feature {feature_id}") })),
        is_active,
    )
}

#[derive(Default)]
struct StoreState {
    next_id: i32,
    banners: BTreeMap<i32, BannerRecordExt>,
    history: HashMap<i32, Vec<HistoryEntry>>,
}

impl StoreState {
    fn conflicts(&self, id: Option<i32>, record: &BannerRecord) -> bool {
        self.banners.values().any(|existing| {
            Some(existing.id) != id
                && existing.record.feature_id == record.feature_id
                && existing
                    .record
                    .tag_ids
                    .iter()
                    .any(|tag| record.tag_ids.contains(tag))
        })
    }

    fn push_history(&mut self, id: i32, record: &BannerRecord) {
        let versions = self.history.entry(id).or_default();
        versions.push(HistoryEntry {
            version: versions.len() as i32 + 1,
            feature_id: record.feature_id,
            tag_ids: record.tag_ids.clone(),
            content: record.content.clone(),
        });
    }
}

/// Banner store kept in memory, with call counters and optional slowness.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    pub add_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub bulk_delete_calls: AtomicUsize,
    pub fail: AtomicBool,
    list_delay: Option<Duration>,
    bulk_delete_gate: Option<Semaphore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `list` sleeps for `delay` first.
    pub fn with_list_delay(delay: Duration) -> Self {
        Self {
            list_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Bulk deletions block until [`MemoryStore::release_bulk_delete`] is called.
    pub fn with_gated_bulk_delete() -> Self {
        Self {
            bulk_delete_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release_bulk_delete(&self) {
        if let Some(gate) = self.bulk_delete_gate.as_ref() {
            gate.add_permits(1);
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("store lock").banners.len()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(RepoError::from_persistence("connection reset"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BannerStore for MemoryStore {
    async fn add(&self, record: &BannerRecord) -> Result<i32, RepoError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut state = self.state.lock().expect("store lock");
        if state.conflicts(None, record) {
            return Err(RepoError::Duplicate {
                constraint: "feature_tag_pkey".to_string(),
            });
        }
        state.next_id += 1;
        let id = state.next_id;
        let now = OffsetDateTime::now_utc();
        state.banners.insert(
            id,
            BannerRecordExt {
                id,
                record: record.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        state.push_history(id, record);
        Ok(id)
    }

    async fn update(&self, id: i32, patch: &BannerPatch) -> Result<(), RepoError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut state = self.state.lock().expect("store lock");
        let mut updated = state
            .banners
            .get(&id)
            .map(|banner| banner.record.clone())
            .ok_or(RepoError::NotFound)?;
        patch.apply_to(&mut updated);
        if state.conflicts(Some(id), &updated) {
            return Err(RepoError::Duplicate {
                constraint: "feature_tag_pkey".to_string(),
            });
        }
        if patch.mask().touches_row() {
            state.push_history(id, &updated);
        }
        if let Some(banner) = state.banners.get_mut(&id) {
            banner.record = updated;
            banner.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn list(&self, options: &BannerListOptions) -> Result<Vec<BannerRecordExt>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        let state = self.state.lock().expect("store lock");
        let selector = options.selector;
        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(state
            .banners
            .values()
            .filter(|banner| {
                selector
                    .feature_id
                    .is_none_or(|feature| banner.record.feature_id == feature)
                    && selector
                        .tag_id
                        .is_none_or(|tag| banner.record.tag_ids.contains(&tag))
            })
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[i32]) -> Result<(), RepoError> {
        self.check()?;
        let mut state = self.state.lock().expect("store lock");
        let mut removed = 0;
        for id in ids {
            if state.banners.remove(id).is_some() {
                state.history.remove(id);
                removed += 1;
            }
        }
        if removed == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_selector(&self, selector: DeleteSelector) -> Result<(), RepoError> {
        self.bulk_delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.bulk_delete_gate.as_ref() {
            let permit = gate.acquire().await.map_err(RepoError::from_persistence)?;
            permit.forget();
        }
        self.check()?;
        let mut state = self.state.lock().expect("store lock");
        let ids: Vec<i32> = state
            .banners
            .values()
            .filter(|banner| match selector {
                DeleteSelector::ByFeature(feature) => banner.record.feature_id == feature,
                DeleteSelector::ByTag(tag) => banner.record.tag_ids.contains(&tag),
            })
            .map(|banner| banner.id)
            .collect();
        if ids.is_empty() {
            return Err(RepoError::NotFound);
        }
        for id in ids {
            state.banners.remove(&id);
            state.history.remove(&id);
        }
        Ok(())
    }

    async fn history(&self, id: i32) -> Result<Vec<HistoryEntry>, RepoError> {
        self.check()?;
        let state = self.state.lock().expect("store lock");
        Ok(state.history.get(&id).cloned().unwrap_or_default())
    }

    async fn select_version(&self, id: i32, version: i32) -> Result<(), RepoError> {
        self.check()?;
        let mut state = self.state.lock().expect("store lock");
        let entry = state
            .history
            .get(&id)
            .and_then(|versions| versions.iter().find(|entry| entry.version == version))
            .cloned()
            .ok_or(RepoError::NotFound)?;
        let mut restored = state
            .banners
            .get(&id)
            .map(|banner| banner.record.clone())
            .ok_or(RepoError::NotFound)?;
        restored.feature_id = entry.feature_id;
        restored.tag_ids = entry.tag_ids;
        restored.content = entry.content;
        state.push_history(id, &restored);
        if let Some(banner) = state.banners.get_mut(&id) {
            banner.record = restored;
        }
        Ok(())
    }
}

/// Content cache kept in memory, with call counters, failure switches and optional slowness.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<IdentKey, UserContent>>,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    get_delay: Option<Duration>,
    put_delay: Option<Duration>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_put_delay(delay: Duration) -> Self {
        Self {
            put_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every `get` sleeps for `delay` first.
    pub fn with_get_delay(delay: Duration) -> Self {
        Self {
            get_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn cached(&self, key: &IdentKey) -> Option<UserContent> {
        self.entries.lock().expect("cache lock").get(key).cloned()
    }
}

#[async_trait]
impl ContentCache for MemoryCache {
    async fn get(&self, key: &IdentKey) -> Result<Option<UserContent>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::remote("connection refused"));
        }
        Ok(self.cached(key))
    }

    async fn put(&self, key: &IdentKey, content: &UserContent) -> Result<(), CacheError> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::remote("connection refused"));
        }
        self.entries
            .lock()
            .expect("cache lock")
            .insert(*key, content.clone());
        Ok(())
    }
}

/// Yield until the service has no background work left.
pub async fn drain(service: &bannerflow::application::banners::BannerService) {
    while service.pending_background() > 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
