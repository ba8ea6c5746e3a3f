//! HTTP surface over the banner service.

mod auth;
mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use auth::{AuthTokens, Role, TOKEN_HEADER};
pub use error::{ApiError, ApiErrorBody, codes};
pub use models::{BannerCreateRequest, BannerIdResponse, BannerUpdateRequest};
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, put},
};

use self::middleware::log_responses;

pub fn build_router(state: HttpState) -> Router {
    let user_routes = Router::new()
        .route("/user_banner", get(handlers::get_user_banner))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_user,
        ));

    let admin_routes = Router::new()
        .route(
            "/banner",
            get(handlers::list_banners)
                .post(handlers::create_banner)
                .delete(handlers::delete_banners_by_selector),
        )
        .route(
            "/banner/{id}",
            patch(handlers::update_banner).delete(handlers::delete_banner),
        )
        .route("/banner/versions/{id}", get(handlers::list_banner_history))
        .route(
            "/banner/versions/{id}/activate",
            put(handlers::select_banner_version),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(user_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
}
