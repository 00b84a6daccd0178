//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request identity
//! extension inserted by the auth middleware.

use crate::adapters::FallbackStore;
use crate::config::Config;
use kintai_core::ports::{AttendanceStore, AuthStore, HolidayCalendar};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers. There is deliberately no request-spanning cache here: every
/// lookup goes through the store ports.
#[derive(Clone)]
pub struct AppState {
    pub attendance: Arc<dyn AttendanceStore>,
    pub auth: Arc<dyn AuthStore>,
    pub holidays: Arc<dyn HolidayCalendar>,
    /// The backend chain itself, exposed for the status endpoint.
    pub storage: Arc<FallbackStore>,
    pub config: Arc<Config>,
}

//=========================================================================================
// CurrentUser (Specific to One Authenticated Request)
//=========================================================================================

/// The identity resolved from the session cookie, inserted into request
/// extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub display_name: String,
    /// The session token backing this request, so handlers can refresh the
    /// session document.
    pub token: String,
}
