//! Admin login and logout.

use axum::{extract::State, http::HeaderMap, Extension, Json};

use super::{success, ApiResult};
use crate::auth::{bearer_token, Credentials, Principal, Session};
use crate::AppState;

/// POST /api/auth/login - Exchange credentials for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Session> {
    success(state.sessions.login(&credentials).await?)
}

/// POST /api/auth/logout - End the caller's session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<()> {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.logout(&token).await;
    }
    success(())
}

/// GET /api/auth/me - The signed-in admin.
pub async fn current_user(Extension(principal): Extension<Principal>) -> ApiResult<Principal> {
    success(principal)
}
