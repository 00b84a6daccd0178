//! services/api/src/adapters/gist.rs
//!
//! Remote mirror backend backed by a GitHub gist. The whole store lives in
//! one gist file (`attendance_data.json`); every document operation loads the
//! mirror, modifies it in memory, and PATCHes it back. Slow but adequate for
//! the fallback role this backend plays.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use kintai_core::ports::{PortError, PortResult, StorageBackend};

use super::mirror;

const MIRROR_FILE: &str = "attendance_data.json";

pub struct GistBackend {
    gist_id: String,
    token: String,
    base_url: String,
    client: reqwest::Client,
}

impl GistBackend {
    pub fn new(gist_id: String, token: String) -> Self {
        Self::with_base_url(gist_id, token, "https://api.github.com".to_string())
    }

    /// Test seam: the gist API base URL is injectable.
    pub fn with_base_url(gist_id: String, token: String, base_url: String) -> Self {
        // The gists API rejects requests without a User-Agent.
        let client = reqwest::Client::builder()
            .user_agent("kintai")
            .build()
            .unwrap_or_default();
        Self {
            gist_id,
            token,
            base_url,
            client,
        }
    }

    fn gist_url(&self) -> String {
        format!("{}/gists/{}", self.base_url.trim_end_matches('/'), self.gist_id)
    }

    async fn load_mirror(&self) -> PortResult<Value> {
        let response = self
            .client
            .get(self.gist_url())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| PortError::Unavailable(format!("gist fetch failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(format!("gist {} not found", self.gist_id)));
        }
        if !response.status().is_success() {
            return Err(PortError::Unavailable(format!(
                "gist fetch failed: {}",
                response.status()
            )));
        }

        let gist: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("gist response is not JSON: {e}")))?;

        match gist
            .get("files")
            .and_then(|files| files.get(MIRROR_FILE))
            .and_then(|file| file.get("content"))
            .and_then(Value::as_str)
        {
            Some(content) => serde_json::from_str(content).map_err(|e| {
                PortError::Unexpected(format!("gist mirror content is not valid JSON: {e}"))
            }),
            // A gist without the mirror file yet is an empty store.
            None => Ok(Value::Object(Map::new())),
        }
    }

    async fn save_mirror(&self, mirror: &Value) -> PortResult<()> {
        let content = serde_json::to_string_pretty(mirror)
            .map_err(|e| PortError::Unexpected(format!("mirror serialization failed: {e}")))?;
        let body = json!({
            "files": { MIRROR_FILE: { "content": content } }
        });

        let response = self
            .client
            .patch(self.gist_url())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(format!("gist update failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PortError::Unavailable(format!(
                "gist update failed: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for GistBackend {
    fn name(&self) -> &'static str {
        "gist"
    }

    /// The backend is constructed only when a gist id and token are
    /// configured, so availability means "configured"; reachability problems
    /// surface as call failures and degrade to the next provider.
    async fn is_available(&self) -> bool {
        true
    }

    async fn get_document(&self, collection: &str, id: &str) -> PortResult<Option<Value>> {
        let mirror = self.load_mirror().await?;
        Ok(mirror::document(&mirror, collection, id).cloned())
    }

    async fn put_document(&self, collection: &str, id: &str, doc: Value) -> PortResult<()> {
        let mut mirror = match self.load_mirror().await {
            Ok(mirror) => mirror,
            Err(PortError::NotFound(msg)) => {
                warn!("{msg}; starting from an empty mirror");
                Value::Object(Map::new())
            }
            Err(e) => return Err(e),
        };
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
        let mut mirror = self.load_mirror().await?;
        mirror::patch_document(&mut mirror, collection, id, path, value);
        self.save_mirror(&mirror).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> PortResult<()> {
        let mut mirror = self.load_mirror().await?;
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
