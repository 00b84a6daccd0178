//! crates/kintai_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage backend; they carry serde
//! derives because every record crosses the document-store boundary as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The editable fields of one user-day, in the order the monthly views and
/// the report render them.
pub const ATTENDANCE_FIELDS: &[&str] = &[
    "check_in",
    "check_out",
    "break_time",
    "travel_cost",
    "travel_from",
    "travel_to",
    "notes",
];

/// One user's one day of work. Every field is stored verbatim as the string
/// the client submitted; numeric coercion happens only at computation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<String>,
    /// Break duration in decimal hours; absent or unparseable means 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_cost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AttendanceRecord {
    /// Sets one named field. Returns `false` for a name outside
    /// [`ATTENDANCE_FIELDS`], leaving the record untouched.
    pub fn set_field(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "check_in" => &mut self.check_in,
            "check_out" => &mut self.check_out,
            "break_time" => &mut self.break_time,
            "travel_cost" => &mut self.travel_cost,
            "travel_from" => &mut self.travel_from,
            "travel_to" => &mut self.travel_to,
            "notes" => &mut self.notes,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Reads one named field; `None` for unknown names or unset fields.
    pub fn field(&self, field: &str) -> Option<&str> {
        match field {
            "check_in" => self.check_in.as_deref(),
            "check_out" => self.check_out.as_deref(),
            "break_time" => self.break_time.as_deref(),
            "travel_cost" => self.travel_cost.as_deref(),
            "travel_from" => self.travel_from.as_deref(),
            "travel_to" => self.travel_to.as_deref(),
            "notes" => self.notes.as_deref(),
            _ => None,
        }
    }
}

// The stored account record - contains sensitive data, only used
// internally for login/registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Represents a browser login session (auth cookie). The token is both the
/// document id in the session collection and the cookie value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub display_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Month-wide running totals written to the report's summary cells.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthlyTotals {
    /// Sum of defined worked minutes.
    pub worked_minutes: i64,
    /// Sum of the travel costs that parse as numbers; unparseable values are
    /// skipped without error.
    pub travel_cost: f64,
}

impl MonthlyTotals {
    pub fn worked_hours(&self) -> f64 {
        self.worked_minutes as f64 / 60.0
    }
}
