//! services/api/src/adapters/postgres.rs
//!
//! The primary document store: PostgreSQL through `sqlx`, one `documents`
//! table keyed by `(collection, doc_id)` with a JSONB payload. Unlike the
//! mirror backends this one supports native partial updates, so a per-field
//! attendance patch is a single atomic `jsonb_set` UPDATE rather than a
//! read-modify-write round trip.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};

use kintai_core::ports::{PortError, PortResult, StorageBackend};

/// A storage backend that keeps documents in a PostgreSQL JSONB table.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Creates a new `PostgresBackend`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Wraps `value` into the nested object described by `path`, e.g.
/// `["2025-07-08", "check_in"]` -> `{"2025-07-08": {"check_in": value}}`.
/// Used as the seed document when a patch targets a row that does not exist
/// yet.
fn nested_doc(path: &[&str], value: &Value) -> Value {
    let mut doc = value.clone();
    for segment in path.iter().rev() {
        doc = json!({ *segment: doc });
    }
    doc
}

/// Builds the upsert statement for a patch at the given path depth.
///
/// The DO UPDATE arm ensures every intermediate object along the path exists
/// (`jsonb_set` only creates the final key) before setting the target value;
/// parameters are `$1` collection, `$2` doc id, `$3` seed document, then one
/// text[] per path prefix, the full path, and finally the value.
fn patch_sql(depth: usize) -> String {
    let mut expr = String::from("documents.data");
    let mut idx = 4;
    for _ in 1..depth {
        expr = format!(
            "jsonb_set({expr}, ${idx}, COALESCE(documents.data #> ${idx}, '{{}}'::jsonb), true)"
        );
        idx += 1;
    }
    format!(
        "INSERT INTO documents (collection, doc_id, data, updated_at) \
         VALUES ($1, $2, $3, now()) \
         ON CONFLICT (collection, doc_id) DO UPDATE \
         SET data = jsonb_set({expr}, ${idx}, ${}, true), updated_at = now()",
        idx + 1
    )
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn is_available(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn get_document(&self, collection: &str, id: &str) -> PortResult<Option<Value>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND doc_id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        row.map(|r| r.try_get::<Value, _>("data").map_err(unexpected))
            .transpose()
    }

    async fn put_document(&self, collection: &str, id: &str, doc: Value) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, data, updated_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (collection, doc_id) DO UPDATE \
             SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(collection)
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        path: &[&str],
        value: Value,
    ) -> PortResult<()> {
        if path.is_empty() {
            return self.put_document(collection, id, value).await;
        }

        let sql = patch_sql(path.len());
        let mut query = sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .bind(nested_doc(path, &value));
        for depth in 1..path.len() {
            let prefix: Vec<String> = path[..depth].iter().map(|s| s.to_string()).collect();
            query = query.bind(prefix);
        }
        let full_path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        query
            .bind(full_path)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> PortResult<Vec<Value>> {
        let rows =
            sqlx::query("SELECT data FROM documents WHERE collection = $1 ORDER BY doc_id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        rows.into_iter()
            .map(|r| r.try_get::<Value, _>("data").map_err(unexpected))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_doc_wraps_value_in_path_order() {
        let doc = nested_doc(&["2025-07-08", "check_in"], &json!("09:00"));
        assert_eq!(doc, json!({"2025-07-08": {"check_in": "09:00"}}));
        assert_eq!(nested_doc(&[], &json!(1)), json!(1));
    }

    #[test]
    fn patch_sql_single_segment_has_no_prefix_sets() {
        let sql = patch_sql(1);
        assert!(sql.contains("SET data = jsonb_set(documents.data, $4, $5, true)"));
    }

    #[test]
    fn patch_sql_two_segments_ensures_parent_object() {
        let sql = patch_sql(2);
        assert!(sql.contains(
            "jsonb_set(jsonb_set(documents.data, $4, \
             COALESCE(documents.data #> $4, '{}'::jsonb), true), $5, $6, true)"
        ));
    }
}
