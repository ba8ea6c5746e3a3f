use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Map, Value};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::domain::banners::{
    BannerListOptions, BannerPatch, BannerRecord, BannerSelector, IdentKey, UserContent,
};

use super::error::ApiError;
use super::models::*;
use super::state::HttpState;

/// Token cancelled once the handler future is dropped, e.g. when the client disconnects.
fn request_token() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

fn ensure_id(id: i32) -> Result<i32, ApiError> {
    if id > 0 {
        Ok(id)
    } else {
        Err(ApiError::bad_request(
            "Invalid banner id",
            Some(format!("banner id must be positive, got {id}")),
        ))
    }
}

fn ensure_non_negative(field: &'static str, value: i32) -> Result<i32, ApiError> {
    if value >= 0 {
        Ok(value)
    } else {
        Err(ApiError::bad_request(
            "Invalid identifier",
            Some(format!("{field} must not be negative, got {value}")),
        ))
    }
}

fn ensure_tag_ids(tag_ids: &[i32]) -> Result<(), ApiError> {
    if tag_ids.is_empty() {
        return Err(ApiError::bad_request(
            "Invalid tag ids",
            Some("tag_ids must contain at least one tag".to_string()),
        ));
    }
    for tag_id in tag_ids {
        ensure_non_negative("tag_id", *tag_id)?;
    }
    Ok(())
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn get_user_banner(
    State(state): State<HttpState>,
    Query(query): Query<UserBannerQuery>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let key = IdentKey::new(
        ensure_non_negative("feature_id", query.feature_id)?,
        ensure_non_negative("tag_id", query.tag_id)?,
    );
    let (cancel, _guard) = request_token();
    let content = state
        .banners
        .get_user_banner(&cancel, key, query.use_last_revision)
        .await?;
    Ok(Json(content.into_inner()))
}

pub async fn list_banners(
    State(state): State<HttpState>,
    Query(query): Query<BannerListQuery>,
) -> Result<Json<Vec<BannerResponse>>, ApiError> {
    let options = BannerListOptions {
        selector: BannerSelector::from_raw(
            query.feature_id.unwrap_or(-1),
            query.tag_id.unwrap_or(-1),
        ),
        limit: query.limit.filter(|limit| *limit > 0),
        offset: query.offset,
    };
    let (cancel, _guard) = request_token();
    let banners = state.banners.list_banners(&cancel, options).await?;
    Ok(Json(banners.into_iter().map(BannerResponse::from).collect()))
}

pub async fn create_banner(
    State(state): State<HttpState>,
    Json(payload): Json<BannerCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_non_negative("feature_id", payload.feature_id)?;
    ensure_tag_ids(&payload.tag_ids)?;

    let record = BannerRecord::new(
        payload.feature_id,
        payload.tag_ids,
        UserContent::new(payload.content),
        payload.is_active,
    );
    let (cancel, _guard) = request_token();
    let banner_id = state.banners.create_banner(&cancel, record).await?;
    Ok((StatusCode::CREATED, Json(BannerIdResponse { banner_id })))
}

pub async fn update_banner(
    State(state): State<HttpState>,
    Path(id): Path<i32>,
    Json(payload): Json<BannerUpdateRequest>,
) -> Result<StatusCode, ApiError> {
    let id = ensure_id(id)?;
    if let Some(feature_id) = payload.feature_id {
        ensure_non_negative("feature_id", feature_id)?;
    }
    if let Some(tag_ids) = payload.tag_ids.as_deref() {
        ensure_tag_ids(tag_ids)?;
    }

    let patch = BannerPatch {
        feature_id: payload.feature_id,
        tag_ids: payload.tag_ids,
        content: payload.content.map(UserContent::new),
        is_active: payload.is_active,
    };
    let (cancel, _guard) = request_token();
    state.banners.update_banner(&cancel, id, patch).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_banner(
    State(state): State<HttpState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let id = ensure_id(id)?;
    let (cancel, _guard) = request_token();
    state.banners.delete_banner(&cancel, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_banners_by_selector(
    State(state): State<HttpState>,
    Query(query): Query<BannerSelectorQuery>,
) -> Result<StatusCode, ApiError> {
    let selector = BannerSelector {
        feature_id: query
            .feature_id
            .map(|id| ensure_non_negative("feature_id", id))
            .transpose()?,
        tag_id: query
            .tag_id
            .map(|id| ensure_non_negative("tag_id", id))
            .transpose()?,
    };
    let (cancel, _guard) = request_token();
    state
        .banners
        .delete_banners_by_selector(&cancel, selector)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn list_banner_history(
    State(state): State<HttpState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<BannerVersionResponse>>, ApiError> {
    let id = ensure_id(id)?;
    let (cancel, _guard) = request_token();
    let history = state.banners.list_banner_history(&cancel, id).await?;
    Ok(Json(
        history.into_iter().map(BannerVersionResponse::from).collect(),
    ))
}

pub async fn select_banner_version(
    State(state): State<HttpState>,
    Path(id): Path<i32>,
    Query(query): Query<VersionQuery>,
) -> Result<StatusCode, ApiError> {
    let id = ensure_id(id)?;
    if query.version <= 0 {
        return Err(ApiError::bad_request(
            "Invalid version",
            Some(format!("version must be positive, got {}", query.version)),
        ));
    }
    let (cancel, _guard) = request_token();
    state
        .banners
        .select_banner_version(&cancel, id, query.version)
        .await?;
    Ok(StatusCode::OK)
}
