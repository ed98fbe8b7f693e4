//! Flat JSON file document store.
//!
//! The file is a single UTF-8 JSON object mapping document identity to
//! extracted text, in insertion order:
//!
//! ```json
//! { "guia_instalacion.pdf": "Los paneles solares ...", "baterias.pdf": "..." }
//! ```
//!
//! Every mutation rewrites the whole file through a temp file and a rename,
//! so a crash mid-write leaves the previous version intact. A file that
//! fails to parse is moved aside to `<name>.corrupt` and the store starts
//! empty.
//!
//! Only identity and text are persisted. `ingested_at` is not part of the
//! mapping: after a reload every document reports the file's modification
//! time instead of its original ingestion time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

use pv_harness_core::models::Document;
use pv_harness_core::store::DocumentStore;

pub struct JsonFileStore {
    path: PathBuf,
    docs: RwLock<IndexMap<String, Document>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading whatever it already holds.
    pub fn open(path: &Path) -> Result<Self> {
        let docs = load(path)?;
        if !docs.is_empty() {
            info!(path = %path.display(), documents = docs.len(), "loaded document store");
        }
        Ok(Self {
            path: path.to_path_buf(),
            docs: RwLock::new(docs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `edit` to a copy of the mapping, persist it, then publish it.
    fn mutate<T>(&self, edit: impl FnOnce(&mut IndexMap<String, Document>) -> T) -> Result<T> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = docs.clone();
        let out = edit(&mut next);
        persist(&self.path, &next)?;
        *docs = next;
        Ok(out)
    }
}

fn load(path: &Path) -> Result<IndexMap<String, Document>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "document store unreadable, starting empty");
            return Ok(IndexMap::new());
        }
    };

    let mapping: IndexMap<String, String> = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            let aside = corrupt_path(path);
            warn!(
                path = %path.display(),
                moved_to = %aside.display(),
                error = %e,
                "document store is corrupted, starting empty"
            );
            std::fs::rename(path, &aside)
                .with_context(|| format!("Failed to move aside {}", path.display()))?;
            return Ok(IndexMap::new());
        }
    };

    let loaded_at: DateTime<Utc> = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(mapping
        .into_iter()
        .map(|(id, text)| {
            let doc = Document {
                id: id.clone(),
                text,
                ingested_at: loaded_at,
            };
            (id, doc)
        })
        .collect())
}

fn persist(path: &Path, docs: &IndexMap<String, Document>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mapping: IndexMap<&str, &str> = docs
        .values()
        .map(|d| (d.id.as_str(), d.text.as_str()))
        .collect();
    let body = serde_json::to_string_pretty(&mapping)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    fn backend(&self) -> &'static str {
        "json"
    }

    async fn put(&self, id: &str, text: &str) -> Result<Document> {
        let doc = Document::new(id, text);
        let stored = doc.clone();
        self.mutate(move |docs| {
            docs.shift_remove(id);
            docs.insert(id.to_string(), stored);
        })?;
        Ok(doc)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Document>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.values().cloned().collect())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        if self.docs.read().unwrap_or_else(PoisonError::into_inner).get(id).is_none() {
            return Ok(false);
        }
        self.mutate(|docs| docs.shift_remove(id).is_some())
    }

    fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_survives_reopen_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/documents.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.put("a.pdf", "primera").await.unwrap();
        store.put("b.pdf", "segunda").await.unwrap();
        store.put("a.pdf", "primera v2").await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let docs = reopened.get_all().await.unwrap();
        let pairs: Vec<(&str, &str)> = docs
            .iter()
            .map(|d| (d.id.as_str(), d.text.as_str()))
            .collect();
        assert_eq!(pairs, vec![("b.pdf", "segunda"), ("a.pdf", "primera v2")]);
    }

    #[tokio::test]
    async fn test_reload_takes_ingested_at_from_file_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put("a.pdf", "uno").await.unwrap();
        store.put("b.pdf", "dos").await.unwrap();
        drop(store);

        let mtime: DateTime<Utc> = std::fs::metadata(&path).unwrap().modified().unwrap().into();
        let docs = JsonFileStore::open(&path).unwrap().get_all().await.unwrap();
        assert!(docs.iter().all(|d| d.ingested_at == mtime));
    }

    #[tokio::test]
    async fn test_file_is_flat_mapping() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put("guía.pdf", "Energía solar").await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "guía.pdf": "Energía solar" }));
    }

    #[tokio::test]
    async fn test_corrupt_file_moved_aside() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(tmp.path().join("documents.json.corrupt").exists());

        store.put("a.pdf", "nuevo").await.unwrap();
        assert_eq!(JsonFileStore::open(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::open(&tmp.path().join("nada.json")).unwrap();
        assert!(store.is_empty());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put("a.pdf", "uno").await.unwrap();
        assert!(store.remove("a.pdf").await.unwrap());
        assert!(!store.remove("a.pdf").await.unwrap());
        assert!(JsonFileStore::open(&path).unwrap().is_empty());
    }
}
