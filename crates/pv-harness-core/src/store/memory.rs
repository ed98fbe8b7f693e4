//! In-memory [`DocumentStore`] for tests and ephemeral sessions.
//!
//! An `IndexMap` behind a `RwLock` keeps insertion order; re-inserting an
//! identity removes it first so it moves to the end.

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::{PoisonError, RwLock};

use super::DocumentStore;
use crate::models::Document;

#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<IndexMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from already-ordered documents.
    pub fn from_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let map = docs.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self {
            docs: RwLock::new(map),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, id: &str, text: &str) -> Result<Document> {
        let doc = Document::new(id, text);
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        docs.shift_remove(id);
        docs.insert(id.to_string(), doc.clone());
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
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.shift_remove(id).is_some())
    }

    fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
