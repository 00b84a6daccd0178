//! services/api/src/web/attendance.rs
//!
//! The attendance surface: the punch screen payload, monthly views, bulk and
//! single-field saves, the punch API, and the spreadsheet export.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use kintai_core::domain::{AttendanceRecord, ATTENDANCE_FIELDS};
use kintai_core::ports::PortError;
use kintai_core::time_rules::{
    jst_now, jst_today_string, month_days, rounded_punch_time, weekday_name,
};

use crate::report::{monthly_report, report_filename};
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// `year`/`month` query parameters shared by the monthly views and the
/// export; both default to the current JST month.
#[derive(Deserialize, ToSchema)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct HomeResponse {
    pub today: String,
    pub username: String,
    pub display_name: String,
    pub check_in: String,
    pub check_out: String,
}

/// One calendar day of the monthly view.
#[derive(Serialize, ToSchema)]
pub struct DayEntry {
    pub date: String,
    pub display_date: u32,
    pub weekday: String,
    pub is_holiday: bool,
    #[schema(value_type = Object)]
    pub data: AttendanceRecord,
}

#[derive(Serialize, ToSchema)]
pub struct MonthlyViewResponse {
    pub year: i32,
    pub month: u32,
    pub username: String,
    pub display_name: String,
    pub today: String,
    pub days: Vec<DayEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    pub success: bool,
    pub saved: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct PunchRequest {
    pub date: Option<String>,
    pub field: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PunchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveFieldRequest {
    pub date: String,
    pub field: String,
    pub value: String,
}

#[derive(Serialize, ToSchema)]
pub struct SaveFieldResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET / - Punch screen data for the logged-in user
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Today's punch state", body = HomeResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn home_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Json<HomeResponse> {
    let today = jst_today_string();
    // A read that fails on every backend degrades to an empty mapping; the
    // failure is already logged inside the chain.
    let attendance = state
        .attendance
        .user_attendance(&user.username)
        .await
        .unwrap_or_else(|e| {
            error!("attendance read failed: {e}");
            Default::default()
        });
    let record = attendance.get(&today).cloned().unwrap_or_default();

    Json(HomeResponse {
        today,
        username: user.username,
        display_name: user.display_name,
        check_in: record.check_in.unwrap_or_default(),
        check_out: record.check_out.unwrap_or_default(),
    })
}

/// GET /attendance (and /attendance_info) - Monthly attendance view
#[utoipa::path(
    get,
    path = "/attendance",
    params(
        ("year" = Option<i32>, Query, description = "Year, default current JST year"),
        ("month" = Option<u32>, Query, description = "Month 1-12, default current JST month")
    ),
    responses(
        (status = 200, description = "One row per calendar day", body = MonthlyViewResponse),
        (status = 400, description = "Invalid year/month"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn monthly_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthlyViewResponse>, (StatusCode, String)> {
    let now = jst_now();
    let year = query.year.unwrap_or_else(|| now.year());
    let month = query.month.unwrap_or_else(|| now.month());
    let days = month_days(year, month).ok_or((
        StatusCode::BAD_REQUEST,
        format!("invalid month: {year}-{month}"),
    ))?;

    let monthly = state
        .attendance
        .monthly_attendance(&user.username, year, month)
        .await
        .unwrap_or_else(|e| {
            error!("attendance read failed: {e}");
            Default::default()
        });

    let days = days
        .into_iter()
        .map(|day| {
            let date = day.format("%Y-%m-%d").to_string();
            let data = monthly.get(&date).cloned().unwrap_or_default();
            DayEntry {
                display_date: day.day(),
                weekday: weekday_name(day),
                is_holiday: state.holidays.is_holiday(day),
                date,
                data,
            }
        })
        .collect();

    Ok(Json(MonthlyViewResponse {
        year,
        month,
        username: user.username,
        display_name: user.display_name,
        today: jst_today_string(),
        days,
    }))
}

/// Splits a bulk-save form key shaped `{field}_{date}` on its known field
/// prefix, e.g. `check_in_2025-07-08` -> `("check_in", "2025-07-08")`.
fn split_bulk_key(key: &str) -> Option<(&str, &str)> {
    ATTENDANCE_FIELDS.iter().find_map(|field| {
        key.strip_prefix(field)
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|date| (*field, date))
    })
}

/// POST /save_attendance - Bulk form save
#[utoipa::path(
    post,
    path = "/save_attendance",
    request_body(content_type = "application/x-www-form-urlencoded", description = "Field names encode {field}_{date}"),
    responses(
        (status = 200, description = "Per-field save outcome", body = SaveResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn save_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<SaveResponse> {
    let mut saved = 0usize;
    let mut failed = 0usize;
    for (key, value) in &form {
        let Some((field, date)) = split_bulk_key(key) else {
            warn!(key = %key, "skipping unrecognized form field");
            continue;
        };
        match state
            .attendance
            .update_field(&user.username, date, field, value)
            .await
        {
            Ok(()) => saved += 1,
            Err(e) => {
                warn!(field, date, "bulk save entry failed: {e}");
                failed += 1;
            }
        }
    }
    info!(username = %user.username, saved, failed, "bulk attendance save");
    Json(SaveResponse {
        success: failed == 0,
        saved,
    })
}

/// POST /api/punch - Record a check-in/check-out at the rounded current time
#[utoipa::path(
    post,
    path = "/api/punch",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Punch recorded", body = PunchResponse),
        (status = 400, description = "Missing or invalid parameters", body = PunchResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn punch_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PunchRequest>,
) -> Response {
    let (Some(date), Some(field)) = (req.date.as_deref(), req.field.as_deref()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(PunchResponse {
                success: false,
                time: None,
                error: Some("Missing parameters".to_string()),
            }),
        )
            .into_response();
    };
    if field != "check_in" && field != "check_out" {
        return (
            StatusCode::BAD_REQUEST,
            Json(PunchResponse {
                success: false,
                time: None,
                error: Some(format!("not a punch field: {field}")),
            }),
        )
            .into_response();
    }

    let time = rounded_punch_time(jst_now());
    match state
        .attendance
        .update_field(&user.username, date, field, &time)
        .await
    {
        Ok(()) => {
            info!(username = %user.username, date, field, time = %time, "punch");
            Json(PunchResponse {
                success: true,
                time: Some(time),
                error: None,
            })
            .into_response()
        }
        Err(e) => {
            error!("punch save failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PunchResponse {
                    success: false,
                    time: None,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// POST /api/save_field (and /api/save_attendance) - Save one field of one day
#[utoipa::path(
    post,
    path = "/api/save_field",
    request_body = SaveFieldRequest,
    responses(
        (status = 200, description = "Save outcome", body = SaveFieldResponse),
        (status = 400, description = "Unknown field name", body = SaveFieldResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn save_field_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SaveFieldRequest>,
) -> Response {
    match state
        .attendance
        .update_field(&user.username, &req.date, &req.field, &req.value)
        .await
    {
        Ok(()) => Json(SaveFieldResponse {
            success: true,
            error: None,
        })
        .into_response(),
        Err(PortError::Validation(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(SaveFieldResponse {
                success: false,
                error: Some(msg),
            }),
        )
            .into_response(),
        // Storage failure is not the client's fault; answer success=false
        // and rely on the logs.
        Err(e) => {
            error!("field save failed: {e}");
            Json(SaveFieldResponse {
                success: false,
                error: None,
            })
            .into_response()
        }
    }
}

/// GET /export_excel - Download the monthly report workbook
#[utoipa::path(
    get,
    path = "/export_excel",
    params(
        ("year" = Option<i32>, Query, description = "Year, default current JST year"),
        ("month" = Option<u32>, Query, description = "Month 1-12, default current JST month")
    ),
    responses(
        (status = 200, description = "xlsx attachment"),
        (status = 400, description = "Invalid year/month"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn export_excel_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, (StatusCode, String)> {
    let now = jst_now();
    let year = query.year.unwrap_or_else(|| now.year());
    let month = query.month.unwrap_or_else(|| now.month());
    if month_days(year, month).is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("invalid month: {year}-{month}"),
        ));
    }

    let monthly = state
        .attendance
        .monthly_attendance(&user.username, year, month)
        .await
        .unwrap_or_else(|e| {
            error!("attendance read failed: {e}");
            Default::default()
        });

    let bytes = monthly_report(
        year,
        month,
        &monthly,
        &user.display_name,
        state.holidays.as_ref(),
    )
    .map_err(|e| {
        error!("report generation failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate report".to_string(),
        )
    })?;

    let filename = report_filename(year, month, &user.display_name);
    // Non-ASCII filenames travel in the RFC 5987 encoded parameter; the
    // plain filename is an ASCII fallback.
    let disposition = format!(
        "attachment; filename=\"attendance_report.xlsx\"; filename*=UTF-8''{}",
        urlencoding::encode(&filename)
    );

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_keys_split_on_known_field_prefixes() {
        assert_eq!(
            split_bulk_key("check_in_2025-07-08"),
            Some(("check_in", "2025-07-08"))
        );
        assert_eq!(
            split_bulk_key("travel_cost_2025-12-31"),
            Some(("travel_cost", "2025-12-31"))
        );
        assert_eq!(split_bulk_key("salary_2025-07-08"), None);
        assert_eq!(split_bulk_key("check_in"), None);
    }
}
