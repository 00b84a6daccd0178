//! services/api/src/adapters/local_file.rs
//!
//! The backend of last resort: the whole store mirrored into one local JSON
//! file. Always available, and doubled as the backup target the fallback
//! selector writes through to whenever a remote backend serves a write.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

use kintai_core::ports::{PortError, PortResult, StorageBackend};

use super::mirror;

pub struct LocalFileBackend {
    path: PathBuf,
}

impl LocalFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the mirror file; a missing file is an empty store.
    async fn load_mirror(&self) -> PortResult<Value> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PortError::Unexpected(format!(
                    "mirror file {} is not valid JSON: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Value::Object(Map::new()))
            }
            Err(e) => Err(PortError::Unexpected(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Like [`Self::load_mirror`], but an unreadable mirror starts writes
    /// from an empty store instead of failing them.
    async fn writable_mirror(&self) -> Value {
        self.load_mirror().await.unwrap_or_else(|e| {
            warn!("discarding unreadable mirror file: {e}");
            Value::Object(Map::new())
        })
    }

    /// Writes the mirror through a temp file and rename so readers never see
    /// a half-written store.
    async fn save_mirror(&self, mirror: &Value) -> PortResult<()> {
        let serialized = serde_json::to_vec_pretty(mirror)
            .map_err(|e| PortError::Unexpected(format!("mirror serialization failed: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &serialized)
            .await
            .map_err(|e| PortError::Unexpected(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| {
                PortError::Unexpected(format!("failed to replace {}: {e}", self.path.display()))
            })
    }
}

#[async_trait]
impl StorageBackend for LocalFileBackend {
    fn name(&self) -> &'static str {
        "local_file"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn get_document(&self, collection: &str, id: &str) -> PortResult<Option<Value>> {
        let mirror = self.load_mirror().await?;
        Ok(mirror::document(&mirror, collection, id).cloned())
    }

    async fn put_document(&self, collection: &str, id: &str, doc: Value) -> PortResult<()> {
        let mut mirror = self.writable_mirror().await;
        mirror::set_document(&mut mirror, collection, id, doc);
        self.save_mirror(&mirror).await
    }

    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        path: &[&str],
        value: Value,
    ) -> PortResult<()> {
        let mut mirror = self.writable_mirror().await;
        mirror::patch_document(&mut mirror, collection, id, path, value);
        self.save_mirror(&mirror).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> PortResult<()> {
        let mut mirror = self.writable_mirror().await;
        if mirror::remove_document(&mut mirror, collection, id) {
            self.save_mirror(&mirror).await?;
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> PortResult<Vec<Value>> {
        let mirror = self.load_mirror().await?;
        Ok(mirror::documents(&mirror, collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> (tempfile::TempDir, LocalFileBackend) {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalFileBackend::new(dir.path().join("attendance_data.json"));
        (dir, backend)
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_store() {
        let (_dir, backend) = backend();
        assert_eq!(backend.get_document("users", "yamada").await.unwrap(), None);
        assert!(backend.list_documents("users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (_dir, backend) = backend();
        backend
            .put_document("users", "yamada", json!({"display_name": "山田"}))
            .await
            .unwrap();
        assert_eq!(
            backend.get_document("users", "yamada").await.unwrap(),
            Some(json!({"display_name": "山田"}))
        );
    }

    #[tokio::test]
    async fn patch_builds_nested_structure_on_disk() {
        let (_dir, backend) = backend();
        backend
            .patch_document(
                "user_attendance",
                "yamada",
                &["2025-07-08", "check_in"],
                json!("09:00"),
            )
            .await
            .unwrap();
        backend
            .patch_document(
                "user_attendance",
                "yamada",
                &["2025-07-08", "check_out"],
                json!("18:15"),
            )
            .await
            .unwrap();
        assert_eq!(
            backend.get_document("user_attendance", "yamada").await.unwrap(),
            Some(json!({"2025-07-08": {"check_in": "09:00", "check_out": "18:15"}}))
        );
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let (_dir, backend) = backend();
        backend
            .put_document("user_sessions", "tok", json!({"token": "tok"}))
            .await
            .unwrap();
        backend.delete_document("user_sessions", "tok").await.unwrap();
        assert_eq!(
            backend.get_document("user_sessions", "tok").await.unwrap(),
            None
        );
        // Deleting again is a no-op, not an error.
        backend.delete_document("user_sessions", "tok").await.unwrap();
    }
}
