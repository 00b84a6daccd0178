//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: the combined login/registration form handler,
//! session status, logout, and display-name updates.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use kintai_core::domain::{Session, UserCredentials};
use kintai_core::ports::PortError;
use kintai_core::time_rules::valid_username;

use crate::web::middleware::session_token;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// The combined login/registration form; `action` selects the operation.
#[derive(Deserialize, ToSchema)]
pub struct AuthForm {
    pub action: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthStatusResponse {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct DisplayNameRequest {
    pub display_name: String,
}

fn session_cookie(token: &str, max_age_seconds: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token, max_age_seconds
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /auth - Report whether the caller holds a valid session
#[utoipa::path(
    get,
    path = "/auth",
    responses(
        (status = 200, description = "Current session status", body = AuthStatusResponse)
    )
)]
pub async fn auth_status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<AuthStatusResponse> {
    let session = match session_token(&headers) {
        Some(token) => state.auth.validate_session(token).await.ok(),
        None => None,
    };
    Json(match session {
        Some(session) => AuthStatusResponse {
            logged_in: true,
            username: Some(session.username),
            display_name: Some(session.display_name),
        },
        None => AuthStatusResponse {
            logged_in: false,
            username: None,
            display_name: None,
        },
    })
}

/// POST /auth - Login or registration form submission
#[utoipa::path(
    post,
    path = "/auth",
    request_body(content_type = "application/x-www-form-urlencoded", description = "Login/registration form"),
    responses(
        (status = 200, description = "Operation succeeded", body = AuthResponse),
        (status = 400, description = "Validation failure", body = AuthResponse),
        (status = 401, description = "Bad credentials", body = AuthResponse),
        (status = 409, description = "Duplicate username", body = AuthResponse)
    )
)]
pub async fn auth_form_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AuthForm>,
) -> Response {
    match form.action.as_str() {
        "login" => login(state, form).await,
        "register" => register(state, form).await,
        other => (
            StatusCode::BAD_REQUEST,
            Json(AuthResponse::err(format!("不明な操作です: {other}"))),
        )
            .into_response(),
    }
}

async fn login(state: Arc<AppState>, form: AuthForm) -> Response {
    let bad_credentials = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(AuthResponse::err(
                "ユーザー名またはパスワードが間違っています",
            )),
        )
            .into_response()
    };

    let credentials = match state.auth.credentials(form.username.trim()).await {
        Ok(credentials) => credentials,
        Err(PortError::NotFound(_)) => return bad_credentials(),
        Err(e) => {
            error!("credential lookup failed: {e}");
            return internal_error();
        }
    };

    let parsed_hash = match PasswordHash::new(&credentials.password_hash) {
        Ok(hash) => hash,
        Err(e) => {
            error!("stored password hash unparseable: {e}");
            return internal_error();
        }
    };
    if Argon2::default()
        .verify_password(form.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return bad_credentials();
    }

    let ttl = Duration::days(state.config.session_ttl_days);
    let session = Session {
        token: Uuid::new_v4().to_string(),
        username: credentials.username.clone(),
        display_name: credentials.display_name.clone(),
        expires_at: Utc::now() + ttl,
    };
    let cookie = session_cookie(&session.token, ttl.num_seconds());
    if let Err(e) = state.auth.create_session(session).await {
        error!("failed to persist session: {e}");
        return internal_error();
    }

    info!(username = %credentials.username, "login");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::ok(format!(
            "ようこそ、{}さん",
            credentials.display_name
        ))),
    )
        .into_response()
}

async fn register(state: Arc<AppState>, form: AuthForm) -> Response {
    let username = form.username.trim();
    let display_name = form.display_name.trim();

    // Field validation mirrors the registration form rules.
    let validation_error = if username.is_empty() || form.password.is_empty() || display_name.is_empty()
    {
        Some("すべての項目を入力してください")
    } else if form.password.len() < 6 {
        Some("パスワードは6文字以上で設定してください")
    } else if form.password != form.confirm_password {
        Some("パスワードが一致しません")
    } else if !valid_username(username) {
        Some("ユーザー名は英数字とアンダースコアのみ使用できます")
    } else {
        None
    };
    if let Some(error) = validation_error {
        return (StatusCode::BAD_REQUEST, Json(AuthResponse::err(error))).into_response();
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = match Argon2::default().hash_password(form.password.as_bytes(), &salt) {
        Ok(hash) => hash.to_string(),
        Err(e) => {
            error!("failed to hash password: {e}");
            return internal_error();
        }
    };

    let result = state
        .auth
        .register(UserCredentials {
            username: username.to_string(),
            password_hash,
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => {
            info!(username, "registered");
            Json(AuthResponse::ok(format!(
                "ユーザー「{display_name}」を登録しました。ログインしてください。"
            )))
            .into_response()
        }
        Err(PortError::Conflict(_)) => (
            StatusCode::CONFLICT,
            Json(AuthResponse::err(format!(
                "ユーザー名「{username}」は既に存在します。別のユーザー名を選択してください。"
            ))),
        )
            .into_response(),
        Err(e) => {
            error!("registration failed: {e}");
            internal_error()
        }
    }
}

/// GET /logout - Destroy the session and clear the cookie
#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 200, description = "Logged out", body = AuthResponse)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        if let Err(e) = state.auth.delete_session(token).await {
            error!("failed to delete session: {e}");
        }
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie("", 0))],
        Json(AuthResponse::ok("ログアウトしました")),
    )
}

/// POST /api/display_name - Update the logged-in user's display name
#[utoipa::path(
    post,
    path = "/api/display_name",
    request_body = DisplayNameRequest,
    responses(
        (status = 200, description = "Display name updated", body = AuthResponse),
        (status = 400, description = "Empty display name", body = AuthResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn display_name_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<DisplayNameRequest>,
) -> Response {
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AuthResponse::err("表示名を入力してください")),
        )
            .into_response();
    }

    if let Err(e) = state
        .auth
        .update_display_name(&user.username, display_name)
        .await
    {
        error!("display name update failed: {e}");
        return internal_error();
    }

    // Refresh the session document so views pick the new name up
    // immediately.
    let refreshed = Session {
        token: user.token.clone(),
        username: user.username.clone(),
        display_name: display_name.to_string(),
        expires_at: Utc::now() + Duration::days(state.config.session_ttl_days),
    };
    if let Err(e) = state.auth.create_session(refreshed).await {
        error!("session refresh failed: {e}");
    }

    Json(AuthResponse::ok(format!(
        "表示名を「{display_name}」に更新しました"
    )))
    .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AuthResponse::err("内部エラーが発生しました")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"hunter2x", &salt)
            .unwrap()
            .to_string();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"hunter2x", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong", &parsed)
            .is_err());
    }

    #[test]
    fn session_cookie_shape() {
        let cookie = session_cookie("abc", 60);
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("Max-Age=60"));
    }
}
