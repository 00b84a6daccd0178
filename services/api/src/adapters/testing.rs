//! services/api/src/adapters/testing.rs
//!
//! In-memory storage backend used by the adapter tests: a mirror-shaped
//! document tree behind a mutex, with switches to simulate an unavailable or
//! write-failing provider.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use kintai_core::ports::{PortError, PortResult, StorageBackend};

use super::mirror;

pub(crate) struct MemoryBackend {
    name: &'static str,
    docs: Mutex<Value>,
    available: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            docs: Mutex::new(Value::Object(Map::new())),
            available: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(PortError::Unavailable(format!("{} rejects writes", self.name)))
        } else {
            Ok(())
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Value> {
        self.docs.lock().expect("memory backend lock poisoned")
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get_document(&self, collection: &str, id: &str) -> PortResult<Option<Value>> {
        Ok(mirror::document(&self.locked(), collection, id).cloned())
    }

    async fn put_document(&self, collection: &str, id: &str, doc: Value) -> PortResult<()> {
        self.check_writable()?;
        mirror::set_document(&mut self.locked(), collection, id, doc);
        Ok(())
    }

    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        path: &[&str],
        value: Value,
    ) -> PortResult<()> {
        self.check_writable()?;
        mirror::patch_document(&mut self.locked(), collection, id, path, value);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> PortResult<()> {
        self.check_writable()?;
        mirror::remove_document(&mut self.locked(), collection, id);
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> PortResult<Vec<Value>> {
        Ok(mirror::documents(&self.locked(), collection))
    }
}
