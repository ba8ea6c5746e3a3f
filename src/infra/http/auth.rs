//! Static-token authentication for the banner API.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use super::error::ApiError;

pub const TOKEN_HEADER: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Tokens accepted for each role.
#[derive(Debug, Clone, Default)]
pub struct AuthTokens {
    user: Vec<String>,
    admin: Vec<String>,
}

impl AuthTokens {
    pub fn new(user: Vec<String>, admin: Vec<String>) -> Self {
        Self { user, admin }
    }

    /// Resolve `token` to a role. Admin tokens win when a token is listed twice.
    pub fn role_for(&self, token: &str) -> Option<Role> {
        if matches_any(&self.admin, token) {
            Some(Role::Admin)
        } else if matches_any(&self.user, token) {
            Some(Role::User)
        } else {
            None
        }
    }
}

// Every candidate is compared so timing does not reveal which one matched.
fn matches_any(candidates: &[String], token: &str) -> bool {
    candidates.iter().fold(false, |found, candidate| {
        let equal: bool = candidate.as_bytes().ct_eq(token.as_bytes()).into();
        found | equal
    })
}

fn resolve(auth: &AuthTokens, request: &Request<Body>) -> Result<Role, ApiError> {
    request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|token| auth.role_for(token))
        .ok_or_else(ApiError::unauthorized)
}

async fn run_as(role: Role, mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(role);
    let mut response = next.run(request).await;
    response.extensions_mut().insert(role);
    response
}

/// Admit user and admin tokens.
pub async fn require_user(
    State(auth): State<Arc<AuthTokens>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match resolve(&auth, &request) {
        Ok(role) => run_as(role, request, next).await,
        Err(err) => err.into_response(),
    }
}

/// Admit admin tokens only; a user token is forbidden.
pub async fn require_admin(
    State(auth): State<Arc<AuthTokens>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match resolve(&auth, &request) {
        Ok(Role::Admin) => run_as(Role::Admin, request, next).await,
        Ok(Role::User) => {
            let mut response = ApiError::forbidden().into_response();
            response.extensions_mut().insert(Role::User);
            response
        }
        Err(err) => err.into_response(),
    }
}
