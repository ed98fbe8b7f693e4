//! Storage abstraction for extracted documents.
//!
//! The [`DocumentStore`] trait hides how documents persist (flat JSON
//! mapping, SQLite, memory) from the indexer and retriever. All backends
//! share the same contract:
//!
//! | Method | Contract |
//! |--------|----------|
//! | [`put`](DocumentStore::put) | insert or replace by identity; the entry moves to the end of the order |
//! | [`get_all`](DocumentStore::get_all) | every document, in order of last insertion |
//! | [`remove`](DocumentStore::remove) | drop a document; `false` if it was absent |
//! | [`is_empty`](DocumentStore::is_empty) | O(1), no I/O |
//!
//! Persisted backends write durably before `put`/`remove` return.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

pub use memory::InMemoryStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for diagnostics (`"memory"`, `"json"`, `"sqlite"`).
    fn backend(&self) -> &'static str;

    /// Insert or overwrite the document stored under `id`.
    async fn put(&self, id: &str, text: &str) -> Result<Document>;

    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// All documents, least recently inserted first.
    async fn get_all(&self) -> Result<Vec<Document>>;

    async fn remove(&self, id: &str) -> Result<bool>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
