//! crates/kintai_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! document database, the gist mirror, or the local backup file.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::{AttendanceRecord, Session, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g.
/// database, network, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid value: {0}")]
    Validation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Backend Port
//=========================================================================================

/// The capability interface shared by every persistence provider (primary
/// document store, gist mirror, local file). Documents are raw JSON values at
/// this boundary; typed conversion happens one layer up.
///
/// The fallback selector holds these as a prioritized list and degrades from
/// one provider to the next on unavailability.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short provider name used in logs and the status endpoint.
    fn name(&self) -> &'static str;

    /// Whether the provider is currently reachable/configured. A `false`
    /// here makes the selector skip the provider without logging an error.
    async fn is_available(&self) -> bool;

    async fn get_document(&self, collection: &str, id: &str) -> PortResult<Option<Value>>;

    /// Creates or fully replaces a document.
    async fn put_document(&self, collection: &str, id: &str, doc: Value) -> PortResult<()>;

    /// Sets a single value at `path` inside a document, creating intermediate
    /// objects as needed. Backends with native partial updates apply this
    /// atomically; mirror backends may fall back to read-modify-write of
    /// their single mirror document.
    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        path: &[&str],
        value: Value,
    ) -> PortResult<()>;

    async fn delete_document(&self, collection: &str, id: &str) -> PortResult<()>;

    /// Returns every document in a collection (small collections only:
    /// users, sessions).
    async fn list_documents(&self, collection: &str) -> PortResult<Vec<Value>>;
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Read and write access to per-user attendance mappings.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// The full date-keyed mapping for one user (empty if none exists).
    async fn user_attendance(
        &self,
        username: &str,
    ) -> PortResult<BTreeMap<String, AttendanceRecord>>;

    /// The slice of the mapping falling inside `(year, month)`. Date keys
    /// that do not parse as ISO dates are skipped.
    async fn monthly_attendance(
        &self,
        username: &str,
        year: i32,
        month: u32,
    ) -> PortResult<BTreeMap<String, AttendanceRecord>>;

    /// Updates one field of one date for one user. Field names outside the
    /// attendance whitelist are rejected with [`PortError::Validation`].
    async fn update_field(
        &self,
        username: &str,
        date: &str,
        field: &str,
        value: &str,
    ) -> PortResult<()>;
}

/// Account and session persistence behind the authentication handlers.
/// Password hashing stays in the web layer; this port only ever sees hashes.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Creates an account. Fails with [`PortError::Conflict`] when the
    /// username is taken, leaving the existing credentials unchanged.
    async fn register(&self, credentials: UserCredentials) -> PortResult<()>;

    async fn credentials(&self, username: &str) -> PortResult<UserCredentials>;

    async fn update_display_name(&self, username: &str, display_name: &str) -> PortResult<()>;

    async fn create_session(&self, session: Session) -> PortResult<()>;

    /// Resolves a cookie token into a session, rejecting unknown and expired
    /// tokens with [`PortError::Unauthorized`].
    async fn validate_session(&self, token: &str) -> PortResult<Session>;

    async fn delete_session(&self, token: &str) -> PortResult<()>;
}

/// Holiday classification for list/report coloring. Implementations may
/// consult an external calendar; the contract only requires weekends to
/// classify as holidays when no calendar is available.
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}
