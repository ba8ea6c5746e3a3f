use crate::domain::banners::IdentKey;

/// Key under which a banner's user content is stored in the remote tier.
pub fn remote_key(key: &IdentKey) -> String {
    format!("feature: {}, tag: {}", key.feature_id, key.tag_id)
}
