use std::sync::Arc;

use crate::application::banners::BannerService;

use super::auth::AuthTokens;

#[derive(Clone)]
pub struct HttpState {
    pub banners: BannerService,
    pub auth: Arc<AuthTokens>,
}
