//! services/api/src/adapters/store.rs
//!
//! This module contains the store adapter, which is the concrete
//! implementation of the `AttendanceStore` and `AuthStore` ports from the
//! `core` crate. It sits on top of the storage backend chain and handles the
//! typed-struct <-> JSON document conversion.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use kintai_core::domain::{AttendanceRecord, Session, UserCredentials, ATTENDANCE_FIELDS};
use kintai_core::ports::{AttendanceStore, AuthStore, PortError, PortResult, StorageBackend};

/// Collection names in the document store.
pub const USERS_COLLECTION: &str = "users";
pub const SESSIONS_COLLECTION: &str = "user_sessions";
pub const ATTENDANCE_COLLECTION: &str = "user_attendance";

/// A store adapter that implements the attendance and auth ports over any
/// `StorageBackend` (in production, the fallback chain).
#[derive(Clone)]
pub struct StoreAdapter {
    storage: Arc<dyn StorageBackend>,
}

impl StoreAdapter {
    /// Creates a new `StoreAdapter`.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Converts an attendance document into the date-keyed mapping,
    /// skipping entries that are not attendance-record shaped.
    fn attendance_from_doc(username: &str, doc: Value) -> BTreeMap<String, AttendanceRecord> {
        let Value::Object(entries) = doc else {
            warn!(username, "attendance document is not an object; treating as empty");
            return BTreeMap::new();
        };
        let mut mapping = BTreeMap::new();
        for (date, record) in entries {
            match serde_json::from_value::<AttendanceRecord>(record) {
                Ok(record) => {
                    mapping.insert(date, record);
                }
                Err(e) => warn!(username, date = %date, "skipping malformed attendance entry: {e}"),
            }
        }
        mapping
    }
}

//=========================================================================================
// `AttendanceStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AttendanceStore for StoreAdapter {
    async fn user_attendance(
        &self,
        username: &str,
    ) -> PortResult<BTreeMap<String, AttendanceRecord>> {
        let doc = self
            .storage
            .get_document(ATTENDANCE_COLLECTION, username)
            .await?;
        Ok(doc
            .map(|doc| Self::attendance_from_doc(username, doc))
            .unwrap_or_default())
    }

    async fn monthly_attendance(
        &self,
        username: &str,
        year: i32,
        month: u32,
    ) -> PortResult<BTreeMap<String, AttendanceRecord>> {
        let mut mapping = self.user_attendance(username).await?;
        mapping.retain(|date_str, _| match date_str.parse::<NaiveDate>() {
            Ok(date) => date.year() == year && date.month() == month,
            Err(_) => {
                warn!(username, date = %date_str, "skipping malformed date key");
                false
            }
        });
        Ok(mapping)
    }

    async fn update_field(
        &self,
        username: &str,
        date: &str,
        field: &str,
        value: &str,
    ) -> PortResult<()> {
        if !ATTENDANCE_FIELDS.contains(&field) {
            return Err(PortError::Validation(format!(
                "unknown attendance field: {field}"
            )));
        }
        self.storage
            .patch_document(
                ATTENDANCE_COLLECTION,
                username,
                &[date, field],
                Value::String(value.to_string()),
            )
            .await
    }
}

//=========================================================================================
// `AuthStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthStore for StoreAdapter {
    async fn register(&self, credentials: UserCredentials) -> PortResult<()> {
        let existing = self
            .storage
            .get_document(USERS_COLLECTION, &credentials.username)
            .await?;
        if existing.is_some() {
            return Err(PortError::Conflict(credentials.username));
        }
        let doc = serde_json::to_value(&credentials)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.storage
            .put_document(USERS_COLLECTION, &credentials.username, doc)
            .await
    }

    async fn credentials(&self, username: &str) -> PortResult<UserCredentials> {
        let doc = self
            .storage
            .get_document(USERS_COLLECTION, username)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("user {username} not found")))?;
        serde_json::from_value(doc).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn update_display_name(&self, username: &str, display_name: &str) -> PortResult<()> {
        // Confirm the account exists first so a patch cannot conjure one up.
        self.credentials(username).await?;
        self.storage
            .patch_document(
                USERS_COLLECTION,
                username,
                &["display_name"],
                Value::String(display_name.to_string()),
            )
            .await
    }

    async fn create_session(&self, session: Session) -> PortResult<()> {
        let doc =
            serde_json::to_value(&session).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.storage
            .put_document(SESSIONS_COLLECTION, &session.token, doc)
            .await
    }

    async fn validate_session(&self, token: &str) -> PortResult<Session> {
        let doc = self
            .storage
            .get_document(SESSIONS_COLLECTION, token)
            .await?
            .ok_or(PortError::Unauthorized)?;
        let session: Session =
            serde_json::from_value(doc).map_err(|e| PortError::Unexpected(e.to_string()))?;
        if session.expires_at < Utc::now() {
            // Expired sessions are reaped on sight; failure to delete only
            // delays the next reap.
            if let Err(e) = self.delete_session(token).await {
                warn!("failed to delete expired session: {e}");
            }
            return Err(PortError::Unauthorized);
        }
        Ok(session)
    }

    async fn delete_session(&self, token: &str) -> PortResult<()> {
        self.storage
            .delete_document(SESSIONS_COLLECTION, token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::MemoryBackend;
    use chrono::Duration;

    fn adapter() -> StoreAdapter {
        StoreAdapter::new(Arc::new(MemoryBackend::new("memory")))
    }

    fn credentials(username: &str) -> UserCredentials {
        UserCredentials {
            username: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            display_name: "山田".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn update_field_round_trips_string_for_string() {
        let store = adapter();
        store
            .update_field("yamada", "2025-07-08", "travel_cost", "540")
            .await
            .unwrap();
        store
            .update_field("yamada", "2025-07-08", "notes", "客先訪問")
            .await
            .unwrap();

        let mapping = store.user_attendance("yamada").await.unwrap();
        let record = &mapping["2025-07-08"];
        assert_eq!(record.travel_cost.as_deref(), Some("540"));
        assert_eq!(record.notes.as_deref(), Some("客先訪問"));
    }

    #[tokio::test]
    async fn update_field_rejects_unknown_fields() {
        let store = adapter();
        let result = store
            .update_field("yamada", "2025-07-08", "salary", "1000000")
            .await;
        assert!(matches!(result, Err(PortError::Validation(_))));
        assert!(store.user_attendance("yamada").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn monthly_attendance_filters_and_skips_malformed_keys() {
        let store = adapter();
        store
            .update_field("yamada", "2025-07-08", "check_in", "09:00")
            .await
            .unwrap();
        store
            .update_field("yamada", "2025-06-30", "check_in", "10:00")
            .await
            .unwrap();
        store
            .update_field("yamada", "not-a-date", "check_in", "11:00")
            .await
            .unwrap();

        let monthly = store.monthly_attendance("yamada", 2025, 7).await.unwrap();
        assert_eq!(monthly.len(), 1);
        assert!(monthly.contains_key("2025-07-08"));
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_the_first_user() {
        let store = adapter();
        store.register(credentials("yamada")).await.unwrap();

        let mut second = credentials("yamada");
        second.password_hash = "$argon2id$other".to_string();
        let result = store.register(second).await;
        assert!(matches!(result, Err(PortError::Conflict(_))));

        let stored = store.credentials("yamada").await.unwrap();
        assert_eq!(stored.password_hash, "$argon2id$stub");
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let store = adapter();
        let session = Session {
            token: "tok".to_string(),
            username: "yamada".to_string(),
            display_name: "山田".to_string(),
            expires_at: Utc::now() + Duration::days(30),
        };
        store.create_session(session).await.unwrap();

        let validated = store.validate_session("tok").await.unwrap();
        assert_eq!(validated.username, "yamada");

        store.delete_session("tok").await.unwrap();
        assert!(matches!(
            store.validate_session("tok").await,
            Err(PortError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let store = adapter();
        let session = Session {
            token: "old".to_string(),
            username: "yamada".to_string(),
            display_name: "山田".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        store.create_session(session).await.unwrap();
        assert!(matches!(
            store.validate_session("old").await,
            Err(PortError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn display_name_update_requires_existing_account() {
        let store = adapter();
        assert!(matches!(
            store.update_display_name("ghost", "名無し").await,
            Err(PortError::NotFound(_))
        ));

        store.register(credentials("yamada")).await.unwrap();
        store.update_display_name("yamada", "山田 太郎").await.unwrap();
        let stored = store.credentials("yamada").await.unwrap();
        assert_eq!(stored.display_name, "山田 太郎");
    }
}
