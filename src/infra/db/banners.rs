use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::{
    application::repos::{BannerStore, RepoError},
    domain::banners::{
        BannerListOptions, BannerPatch, BannerRecord, BannerRecordExt, DeleteSelector,
        HistoryEntry, UserContent,
    },
};

use super::{
    PostgresRepositories, map_sqlx_error,
    query::{
        ACTIVATE_BANNER, DEACTIVATE_BANNER, DELETE_BANNERS, INSERT_BANNER, SELECT_HISTORY,
        SELECT_VERSION, content_json, list_query, resolve_selector_query, update_query,
    },
};

#[derive(sqlx::FromRow)]
struct BannerRow {
    id: i32,
    feature_id: i32,
    tag_ids: Vec<i32>,
    content: Json<Map<String, Value>>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    is_active: bool,
}

impl From<BannerRow> for BannerRecordExt {
    fn from(row: BannerRow) -> Self {
        Self {
            id: row.id,
            record: BannerRecord::new(
                row.feature_id,
                row.tag_ids,
                UserContent::new(row.content.0),
                row.is_active,
            ),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    version: i32,
    feature_id: i32,
    tag_ids: Vec<i32>,
    content: Json<Map<String, Value>>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            version: row.version,
            feature_id: row.feature_id,
            tag_ids: row.tag_ids,
            content: UserContent::new(row.content.0),
        }
    }
}

#[async_trait]
impl BannerStore for PostgresRepositories {
    async fn add(&self, record: &BannerRecord) -> Result<i32, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let id: i32 = sqlx::query_scalar(INSERT_BANNER)
            .bind(record.feature_id)
            .bind(&record.tag_ids)
            .bind(content_json(record.content.as_map()))
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !record.is_active {
            sqlx::query(DEACTIVATE_BANNER)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(id)
    }

    async fn update(&self, id: i32, patch: &BannerPatch) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let mut qb = update_query(id, patch);
        let updated: Option<i32> = qb
            .build_query_scalar()
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if updated.is_none() {
            return Err(RepoError::NotFound);
        }

        if let Some(is_active) = patch.is_active {
            let statement = if is_active {
                ACTIVATE_BANNER
            } else {
                DEACTIVATE_BANNER
            };
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn list(&self, options: &BannerListOptions) -> Result<Vec<BannerRecordExt>, RepoError> {
        let mut qb = list_query(options);
        let rows: Vec<BannerRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BannerRecordExt::from).collect())
    }

    async fn delete_by_ids(&self, ids: &[i32]) -> Result<(), RepoError> {
        let result = sqlx::query(DELETE_BANNERS)
            .bind(ids)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_selector(&self, selector: DeleteSelector) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let mut qb = resolve_selector_query(selector);
        let ids: Vec<i32> = qb
            .build_query_scalar()
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if ids.is_empty() {
            return Err(RepoError::NotFound);
        }

        sqlx::query(DELETE_BANNERS)
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn history(&self, id: i32) -> Result<Vec<HistoryEntry>, RepoError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(SELECT_HISTORY)
            .bind(id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn select_version(&self, id: i32, version: i32) -> Result<(), RepoError> {
        let result = sqlx::query(SELECT_VERSION)
            .bind(id)
            .bind(version)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
