//! services/api/src/adapters/fallback.rs
//!
//! The persistence backend selector: a prioritized list of interchangeable
//! storage providers behind the one `StorageBackend` capability interface.
//! Reads are served by the first available provider and degrade silently
//! down the list on failure; writes go to the first available provider and
//! are additionally mirrored into the final provider (the local backup file)
//! whenever it was not the one that served the write. Failed writes are
//! logged, never retried; the selector favors availability over consistency.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use kintai_core::ports::{PortError, PortResult, StorageBackend};

pub struct FallbackStore {
    /// Providers in fixed priority order; by construction the last entry is
    /// the local backup.
    backends: Vec<Arc<dyn StorageBackend>>,
}

/// One write operation, expressed once so the same degrade-and-mirror policy
/// applies to puts, patches, and deletes.
enum WriteOp<'a> {
    Put { doc: &'a Value },
    Patch { path: &'a [&'a str], value: &'a Value },
    Delete,
}

impl WriteOp<'_> {
    async fn apply(
        &self,
        backend: &dyn StorageBackend,
        collection: &str,
        id: &str,
    ) -> PortResult<()> {
        match self {
            WriteOp::Put { doc } => {
                backend
                    .put_document(collection, id, Value::clone(doc))
                    .await
            }
            WriteOp::Patch { path, value } => {
                backend
                    .patch_document(collection, id, path, Value::clone(value))
                    .await
            }
            WriteOp::Delete => backend.delete_document(collection, id).await,
        }
    }
}

impl FallbackStore {
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        Self { backends }
    }

    /// Provider names with their current availability, for the status
    /// endpoint.
    pub async fn availability(&self) -> Vec<(&'static str, bool)> {
        let mut out = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            out.push((backend.name(), backend.is_available().await));
        }
        out
    }

    async fn write_through(&self, collection: &str, id: &str, op: WriteOp<'_>) -> PortResult<()> {
        let mut served: Option<usize> = None;
        for (index, backend) in self.backends.iter().enumerate() {
            if !backend.is_available().await {
                debug!(backend = backend.name(), "skipping unavailable backend");
                continue;
            }
            match op.apply(backend.as_ref(), collection, id).await {
                Ok(()) => {
                    served = Some(index);
                    break;
                }
                Err(e) => {
                    warn!(backend = backend.name(), "write failed, degrading: {e}");
                }
            }
        }

        let Some(served) = served else {
            error!(collection, id, "write dropped: no storage backend accepted it");
            return Err(PortError::Unavailable(
                "no storage backend accepted the write".to_string(),
            ));
        };

        // Keep the local backup in step whenever a remote provider served
        // the write. Backup failure is logged, not propagated.
        if served + 1 != self.backends.len() {
            if let Some(backup) = self.backends.last() {
                if let Err(e) = op.apply(backup.as_ref(), collection, id).await {
                    warn!(backend = backup.name(), "backup mirror write failed: {e}");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FallbackStore {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn is_available(&self) -> bool {
        for backend in &self.backends {
            if backend.is_available().await {
                return true;
            }
        }
        false
    }

    async fn get_document(&self, collection: &str, id: &str) -> PortResult<Option<Value>> {
        for backend in &self.backends {
            if !backend.is_available().await {
                debug!(backend = backend.name(), "skipping unavailable backend");
                continue;
            }
            match backend.get_document(collection, id).await {
                Ok(doc) => return Ok(doc),
                Err(e) => warn!(backend = backend.name(), "read failed, degrading: {e}"),
            }
        }
        Err(PortError::Unavailable(
            "no storage backend served the read".to_string(),
        ))
    }

    async fn put_document(&self, collection: &str, id: &str, doc: Value) -> PortResult<()> {
        self.write_through(collection, id, WriteOp::Put { doc: &doc })
            .await
    }

    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        path: &[&str],
        value: Value,
    ) -> PortResult<()> {
        self.write_through(collection, id, WriteOp::Patch { path, value: &value })
            .await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> PortResult<()> {
        self.write_through(collection, id, WriteOp::Delete).await
    }

    async fn list_documents(&self, collection: &str) -> PortResult<Vec<Value>> {
        for backend in &self.backends {
            if !backend.is_available().await {
                continue;
            }
            match backend.list_documents(collection).await {
                Ok(docs) => return Ok(docs),
                Err(e) => warn!(backend = backend.name(), "list failed, degrading: {e}"),
            }
        }
        Err(PortError::Unavailable(
            "no storage backend served the list".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::MemoryBackend;
    use serde_json::json;

    fn chain(
        backends: Vec<Arc<MemoryBackend>>,
    ) -> (FallbackStore, Vec<Arc<MemoryBackend>>) {
        let dyns: Vec<Arc<dyn StorageBackend>> = backends
            .iter()
            .map(|b| b.clone() as Arc<dyn StorageBackend>)
            .collect();
        (FallbackStore::new(dyns), backends)
    }

    #[tokio::test]
    async fn reads_prefer_the_first_available_backend() {
        let (store, backends) = chain(vec![
            Arc::new(MemoryBackend::new("primary")),
            Arc::new(MemoryBackend::new("backup")),
        ]);
        backends[0]
            .put_document("users", "yamada", json!({"from": "primary"}))
            .await
            .unwrap();
        backends[1]
            .put_document("users", "yamada", json!({"from": "backup"}))
            .await
            .unwrap();

        let doc = store.get_document("users", "yamada").await.unwrap();
        assert_eq!(doc, Some(json!({"from": "primary"})));

        backends[0].set_available(false);
        let doc = store.get_document("users", "yamada").await.unwrap();
        assert_eq!(doc, Some(json!({"from": "backup"})));
    }

    #[tokio::test]
    async fn writes_mirror_into_the_local_backup() {
        let (store, backends) = chain(vec![
            Arc::new(MemoryBackend::new("primary")),
            Arc::new(MemoryBackend::new("gist")),
            Arc::new(MemoryBackend::new("local")),
        ]);

        store
            .put_document("users", "yamada", json!({"display_name": "山田"}))
            .await
            .unwrap();

        // Served by the primary, mirrored into the last backend, and the
        // middle provider is left untouched.
        assert!(backends[0].get_document("users", "yamada").await.unwrap().is_some());
        assert!(backends[1].get_document("users", "yamada").await.unwrap().is_none());
        assert!(backends[2].get_document("users", "yamada").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failing_write_degrades_to_the_next_backend() {
        let (store, backends) = chain(vec![
            Arc::new(MemoryBackend::new("primary")),
            Arc::new(MemoryBackend::new("local")),
        ]);
        backends[0].set_fail_writes(true);

        store
            .patch_document("user_attendance", "yamada", &["2025-07-08", "check_in"], json!("09:00"))
            .await
            .unwrap();

        assert!(backends[0]
            .get_document("user_attendance", "yamada")
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            backends[1].get_document("user_attendance", "yamada").await.unwrap(),
            Some(json!({"2025-07-08": {"check_in": "09:00"}}))
        );
    }

    #[tokio::test]
    async fn write_with_no_willing_backend_is_an_error() {
        let (store, backends) = chain(vec![Arc::new(MemoryBackend::new("only"))]);
        backends[0].set_fail_writes(true);

        let result = store.put_document("users", "yamada", json!({})).await;
        assert!(matches!(result, Err(PortError::Unavailable(_))));
    }

    #[tokio::test]
    async fn local_only_write_does_not_mirror_twice() {
        let (store, backends) = chain(vec![
            Arc::new(MemoryBackend::new("primary")),
            Arc::new(MemoryBackend::new("local")),
        ]);
        backends[0].set_available(false);

        store
            .put_document("users", "yamada", json!({"display_name": "山田"}))
            .await
            .unwrap();

        assert!(backends[0].get_document("users", "yamada").await.unwrap().is_none());
        assert!(backends[1].get_document("users", "yamada").await.unwrap().is_some());
    }
}
