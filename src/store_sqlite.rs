//! SQLite-backed document store.
//!
//! One row per document. `seq` increases on every `put`, so ordering by it
//! yields documents in order of last insertion. The document count is
//! cached in memory so `is_empty` does no I/O.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

use pv_harness_core::models::Document;
use pv_harness_core::store::DocumentStore;

use crate::db;

pub struct SqliteStore {
    pool: SqlitePool,
    count: AtomicUsize,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// A file that SQLite cannot open or migrate is renamed to
    /// `<name>.corrupt` and replaced by an empty database.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = match open_pool(path).await {
            Ok(pool) => pool,
            Err(e) => {
                let aside = corrupt_path(path);
                warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "document database is unreadable, starting empty"
                );
                move_aside(path, &aside)?;
                open_pool(path).await?
            }
        };

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&pool)
            .await?;

        Ok(Self {
            pool,
            count: AtomicUsize::new(count as usize),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn open_pool(path: &Path) -> Result<SqlitePool> {
    let pool = db::connect(path).await?;
    if let Err(e) = db::run_migrations(&pool).await {
        pool.close().await;
        return Err(e);
    }
    Ok(pool)
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

fn move_aside(path: &Path, aside: &Path) -> Result<()> {
    std::fs::rename(path, aside)
        .with_context(|| format!("Failed to move aside {}", path.display()))?;
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_os_string();
        side.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(side));
    }
    Ok(())
}

fn row_to_document((id, body, ingested_at): (String, String, i64)) -> Document {
    Document {
        id,
        text: body,
        ingested_at: DateTime::from_timestamp(ingested_at, 0).unwrap_or_else(Utc::now),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn put(&self, id: &str, text: &str) -> Result<Document> {
        let doc = Document::new(id, text);
        let mut tx = self.pool.begin().await?;

        let next_seq: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) + 1 FROM documents")
            .fetch_one(&mut *tx)
            .await?;
        let existed: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, body, ingested_at, seq)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                body = excluded.body,
                ingested_at = excluded.ingested_at,
                seq = excluded.seq
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(doc.ingested_at.timestamp())
        .bind(next_seq)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        if !existed {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(doc)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row: Option<(String, String, i64)> =
            sqlx::query_as("SELECT id, body, ingested_at FROM documents WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(row_to_document))
    }

    async fn get_all(&self) -> Result<Vec<Document>> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT id, body, ingested_at FROM documents ORDER BY seq ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(row_to_document).collect())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            self.count.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_overwrite_and_order_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pvh.sqlite");

        let store = SqliteStore::open(&path).await.unwrap();
        store.put("a.pdf", "uno").await.unwrap();
        store.put("b.pdf", "dos").await.unwrap();
        store.put("a.pdf", "uno v2").await.unwrap();
        assert_eq!(store.len(), 2);
        store.close().await;

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        let docs = reopened.get_all().await.unwrap();
        let pairs: Vec<(&str, &str)> = docs
            .iter()
            .map(|d| (d.id.as_str(), d.text.as_str()))
            .collect();
        assert_eq!(pairs, vec![("b.pdf", "dos"), ("a.pdf", "uno v2")]);
    }

    #[tokio::test]
    async fn test_remove() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("pvh.sqlite")).await.unwrap();
        store.put("a.pdf", "uno").await.unwrap();
        assert!(store.remove("a.pdf").await.unwrap());
        assert!(!store.remove("a.pdf").await.unwrap());
        assert!(store.is_empty());
        assert!(store.get("a.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_file_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pvh.sqlite");
        std::fs::write(&path, b"this is not a sqlite database at all, just bytes").unwrap();

        let store = SqliteStore::open(&path).await.unwrap();
        assert!(store.is_empty());
        assert!(tmp.path().join("pvh.sqlite.corrupt").exists());
        store.put("a.pdf", "uno").await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
