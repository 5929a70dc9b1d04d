//! SQLite blob store.
//!
//! Implements `BlobStore` from `dossier-core` on the `drafts` table. Writes
//! go through the single-connection writer pool; reads use the reader pool.

use chrono::Utc;
use sqlx::Row;

use dossier_core::draft::BlobStore;
use dossier_types::error::StorageError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `BlobStore`.
#[derive(Clone)]
pub struct SqliteBlobStore {
    pool: DatabasePool,
}

impl SqliteBlobStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` prefix match.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl BlobStore for SqliteBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT blob FROM drafts WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(backend)?;

        row.map(|row| row.try_get::<String, _>("blob").map_err(backend))
            .transpose()
    }

    async fn write(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO drafts (key, blob, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET blob = excluded.blob, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(blob)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StorageError::WriteRejected(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM drafts WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT key FROM drafts WHERE key LIKE ? ESCAPE '\\' ORDER BY key")
            .bind(like_prefix(prefix))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(backend))
            .collect()
    }
}
