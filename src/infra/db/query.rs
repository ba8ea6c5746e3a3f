//! SQL construction for the banner repository.

use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use crate::domain::banners::{BannerListOptions, BannerPatch, DeleteSelector};

pub(super) const BANNER_COLUMNS: &str = "b.id, b.feature_id, b.tag_ids, b.content, \
    b.created_at, b.updated_at, \
    NOT EXISTS (SELECT 1 FROM deactivated d WHERE d.banner_id = b.id) AS is_active";

pub(super) const INSERT_BANNER: &str =
    "INSERT INTO banners (feature_id, tag_ids, content) VALUES ($1, $2, $3) RETURNING id";
pub(super) const DEACTIVATE_BANNER: &str =
    "INSERT INTO deactivated (banner_id) VALUES ($1) ON CONFLICT DO NOTHING";
pub(super) const ACTIVATE_BANNER: &str = "DELETE FROM deactivated WHERE banner_id = $1";
pub(super) const DELETE_BANNERS: &str = "DELETE FROM banners WHERE id = ANY($1)";
pub(super) const SELECT_HISTORY: &str = "SELECT version, feature_id, tag_ids, content \
    FROM banner_history WHERE banner_id = $1 ORDER BY version";
pub(super) const SELECT_VERSION: &str = "UPDATE banners b \
    SET feature_id = h.feature_id, tag_ids = h.tag_ids, content = h.content, updated_at = now() \
    FROM banner_history h \
    WHERE b.id = $1 AND h.banner_id = b.id AND h.version = $2";

/// Banners matching the selector, ordered by id, optionally paged.
pub(super) fn list_query(options: &BannerListOptions) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(BANNER_COLUMNS);
    qb.push(" FROM banners b");

    let selector = options.selector;
    if selector.feature_id.is_some() || selector.tag_id.is_some() {
        qb.push(" WHERE EXISTS (SELECT 1 FROM feature_tag ft WHERE ft.banner_id = b.id");
        if let Some(feature_id) = selector.feature_id {
            qb.push(" AND ft.feature_id = ");
            qb.push_bind(feature_id);
        }
        if let Some(tag_id) = selector.tag_id {
            qb.push(" AND ft.tag_id = ");
            qb.push_bind(tag_id);
        }
        qb.push(")");
    }

    qb.push(" ORDER BY b.id");
    if let Some(limit) = options.limit {
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));
    }
    if let Some(offset) = options.offset {
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(offset));
    }
    qb
}

/// Row update touching `updated_at` and each supplied column. Returns the id when the row exists.
pub(super) fn update_query(id: i32, patch: &BannerPatch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE banners SET updated_at = now()");
    if let Some(feature_id) = patch.feature_id {
        qb.push(", feature_id = ");
        qb.push_bind(feature_id);
    }
    if let Some(tag_ids) = patch.tag_ids.as_ref() {
        let mut tag_ids = tag_ids.clone();
        tag_ids.sort_unstable();
        tag_ids.dedup();
        qb.push(", tag_ids = ");
        qb.push_bind(tag_ids);
    }
    if let Some(content) = patch.content.as_ref() {
        qb.push(", content = ");
        qb.push_bind(content_json(content.as_map()));
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(" RETURNING id");
    qb
}

/// Distinct ids of the banners a bulk delete addresses.
pub(super) fn resolve_selector_query(selector: DeleteSelector) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT DISTINCT banner_id FROM feature_tag WHERE ");
    match selector {
        DeleteSelector::ByFeature(feature_id) => {
            qb.push("feature_id = ");
            qb.push_bind(feature_id);
        }
        DeleteSelector::ByTag(tag_id) => {
            qb.push("tag_id = ");
            qb.push_bind(tag_id);
        }
    }
    qb.push(" ORDER BY banner_id");
    qb
}

pub(super) fn content_json(content: &Map<String, Value>) -> Json<Map<String, Value>> {
    Json(content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::banners::{BannerSelector, UserContent};

    #[test]
    fn list_without_selector_has_no_filter() {
        let qb = list_query(&BannerListOptions::default());
        assert!(!qb.sql().contains("feature_tag"));
        assert!(qb.sql().ends_with(" FROM banners b ORDER BY b.id"));
    }

    #[test]
    fn list_with_full_selector_filters_both_ids() {
        let options = BannerListOptions::unbounded(BannerSelector {
            feature_id: Some(1),
            tag_id: Some(2),
        });
        let qb = list_query(&options);
        assert!(qb.sql().contains(
            " WHERE EXISTS (SELECT 1 FROM feature_tag ft WHERE ft.banner_id = b.id \
             AND ft.feature_id = $1 AND ft.tag_id = $2) ORDER BY b.id"
        ));
    }

    #[test]
    fn list_paging_binds_after_selector() {
        let options = BannerListOptions {
            selector: BannerSelector::tag(7),
            limit: Some(10),
            offset: Some(20),
        };
        let qb = list_query(&options);
        assert!(qb.sql().contains("AND ft.tag_id = $1)"));
        assert!(qb.sql().ends_with(" ORDER BY b.id LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn update_only_sets_supplied_columns() {
        let patch = BannerPatch {
            tag_ids: Some(vec![3, 1]),
            content: Some(UserContent::default()),
            ..Default::default()
        };
        let qb = update_query(9, &patch);
        assert_eq!(
            qb.sql(),
            "UPDATE banners SET updated_at = now(), tag_ids = $1, content = $2 \
             WHERE id = $3 RETURNING id"
        );
    }

    #[test]
    fn activity_only_update_touches_timestamp() {
        let patch = BannerPatch {
            is_active: Some(false),
            ..Default::default()
        };
        let qb = update_query(4, &patch);
        assert_eq!(
            qb.sql(),
            "UPDATE banners SET updated_at = now() WHERE id = $1 RETURNING id"
        );
    }

    #[test]
    fn selector_resolution_uses_fixed_dimension() {
        let by_feature = resolve_selector_query(DeleteSelector::ByFeature(5));
        assert_eq!(
            by_feature.sql(),
            "SELECT DISTINCT banner_id FROM feature_tag WHERE feature_id = $1 ORDER BY banner_id"
        );
        let by_tag = resolve_selector_query(DeleteSelector::ByTag(5));
        assert!(by_tag.sql().contains("WHERE tag_id = $1"));
    }
}
