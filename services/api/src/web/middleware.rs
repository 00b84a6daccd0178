//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::{AppState, CurrentUser};

/// Pulls the session token out of the `session` cookie, if present.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|c| {
        let c = c.trim();
        c.strip_prefix("session=")
    })
}

/// Middleware that validates the auth session cookie and resolves the user.
///
/// If valid, inserts a [`CurrentUser`] into request extensions for handlers
/// to use. If invalid, missing, or expired, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the session token from the cookie header
    let token = session_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Validate the session through the auth store
    let session = state.auth.validate_session(token).await.map_err(|e| {
        debug!("session validation failed: {e}");
        StatusCode::UNAUTHORIZED
    })?;

    // 3. Insert the resolved identity into request extensions
    req.extensions_mut().insert(CurrentUser {
        username: session.username,
        display_name: session.display_name,
        token: session.token,
    });

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
