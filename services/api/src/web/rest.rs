//! services/api/src/web/rest.rs
//!
//! Contains the service status endpoint and the master definition for the
//! OpenAPI specification.

use axum::{extract::State, response::Json};
use chrono::Utc;
use kintai_core::ports::StorageBackend;
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::adapters::store::{SESSIONS_COLLECTION, USERS_COLLECTION};
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::auth_status_handler,
        crate::web::auth::auth_form_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::display_name_handler,
        crate::web::attendance::home_handler,
        crate::web::attendance::monthly_view_handler,
        crate::web::attendance::save_attendance_handler,
        crate::web::attendance::punch_handler,
        crate::web::attendance::save_field_handler,
        crate::web::attendance::export_excel_handler,
        status_handler,
    ),
    components(
        schemas(
            crate::web::auth::AuthForm,
            crate::web::auth::AuthResponse,
            crate::web::auth::AuthStatusResponse,
            crate::web::auth::DisplayNameRequest,
            crate::web::attendance::HomeResponse,
            crate::web::attendance::DayEntry,
            crate::web::attendance::MonthlyViewResponse,
            crate::web::attendance::SaveResponse,
            crate::web::attendance::PunchRequest,
            crate::web::attendance::PunchResponse,
            crate::web::attendance::SaveFieldRequest,
            crate::web::attendance::SaveFieldResponse,
            StatusResponse,
            BackendStatus,
        )
    ),
    tags(
        (name = "kintai API", description = "API endpoints for the time-attendance tracker.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Service Status
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BackendStatus {
    pub name: String,
    pub available: bool,
}

/// The unauthenticated service status payload: per-provider availability and
/// coarse store counts when a provider can list them.
#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub timestamp: String,
    pub backends: Vec<BackendStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_count: Option<usize>,
}

/// GET /api/status - Storage backend availability and store counts
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Service status", body = StatusResponse)
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let backends = state
        .storage
        .availability()
        .await
        .into_iter()
        .map(|(name, available)| BackendStatus {
            name: name.to_string(),
            available,
        })
        .collect();

    let user_count = state
        .storage
        .list_documents(USERS_COLLECTION)
        .await
        .ok()
        .map(|docs| docs.len());
    let session_count = state
        .storage
        .list_documents(SESSIONS_COLLECTION)
        .await
        .ok()
        .map(|docs| docs.len());

    Json(StatusResponse {
        timestamp: Utc::now().to_rfc3339(),
        backends,
        user_count,
        session_count,
    })
}
