//! Orchestration of store, chunker, index, retriever, and composer.
//!
//! The [`Engine`] owns the one mutable critical section in the system:
//! ingestion (`put` followed by the index update) runs under a single async
//! mutex, while queries only take the index's own read path and therefore
//! see either the state before an ingestion or the state after it.
//!
//! The index is brought in line with the store lazily by
//! [`ensure_built`](Engine::ensure_built), which first tries to restore a
//! persisted index and otherwise rebuilds from every stored document.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chunk::Chunker;
use crate::compose::ContextComposer;
use crate::error::{Error, Result};
use crate::index::FragmentIndex;
use crate::model::LanguageModel;
use crate::models::{Document, Fragment, ScoredFragment};
use crate::retrieve::Retriever;
use crate::store::DocumentStore;

/// Outcome class of a question, as reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    NoDocuments,
    NoRelevantInfo,
    ProviderError,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Answered => "answered",
            AnswerStatus::NoDocuments => "no_documents",
            AnswerStatus::NoRelevantInfo => "no_relevant_info",
            AnswerStatus::ProviderError => "provider_error",
        }
    }
}

/// `(status, display_text)` plus the fragments the answer was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub status: AnswerStatus,
    pub display_text: String,
    pub sources: Vec<ScoredFragment>,
}

impl Answer {
    fn notice(status: AnswerStatus, text: &str) -> Self {
        Self {
            status,
            display_text: text.to_string(),
            sources: Vec::new(),
        }
    }

    /// Document the best-ranked fragment came from.
    pub fn source(&self) -> Option<&str> {
        self.sources.first().map(|s| s.document.as_str())
    }
}

/// Per-document listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub chars: usize,
    pub fragments: usize,
    pub ingested_at: DateTime<Utc>,
}

pub struct Engine {
    store: Arc<dyn DocumentStore>,
    index: Arc<dyn FragmentIndex>,
    chunker: Chunker,
    retriever: Retriever,
    composer: ContextComposer,
    writer: Mutex<()>,
    built: AtomicBool,
}

impl Engine {
    pub fn new(store: Arc<dyn DocumentStore>, index: Arc<dyn FragmentIndex>) -> Self {
        Self {
            store,
            index,
            chunker: Chunker::default(),
            retriever: Retriever::default(),
            composer: ContextComposer::default(),
            writer: Mutex::new(()),
            built: AtomicBool::new(false),
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_composer(mut self, composer: ContextComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn index(&self) -> &dyn FragmentIndex {
        self.index.as_ref()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn composer(&self) -> &ContextComposer {
        &self.composer
    }

    pub fn has_documents(&self) -> bool {
        !self.store.is_empty()
    }

    /// Make the index reflect the store. Idempotent; cheap once built.
    pub async fn ensure_built(&self) -> Result<()> {
        if self.built.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.writer.lock().await;
        self.build_locked(true).await
    }

    /// Discard the index and rebuild it from the store.
    ///
    /// Returns the number of fragments indexed.
    pub async fn reindex(&self) -> Result<usize> {
        let _guard = self.writer.lock().await;
        self.built.store(false, Ordering::Release);
        self.build_locked(false).await?;
        Ok(self.index.len())
    }

    async fn build_locked(&self, allow_restore: bool) -> Result<()> {
        if self.built.load(Ordering::Acquire) {
            return Ok(());
        }
        let fragments = self.all_fragments().await?;
        let restored = allow_restore && self.index.restore(&fragments).await?;
        if !restored {
            self.index.rebuild(&fragments).await?;
        }
        self.built.store(true, Ordering::Release);
        info!(
            strategy = self.index.strategy(),
            fragments = fragments.len(),
            restored,
            "index ready"
        );
        Ok(())
    }

    async fn all_fragments(&self) -> Result<Vec<Fragment>> {
        let docs = self.store.get_all().await.map_err(Error::Store)?;
        Ok(docs
            .iter()
            .flat_map(|doc| self.chunker.fragments(doc))
            .collect())
    }

    /// Store `text` under `id`, replacing any previous version, and
    /// re-index its fragments. Returns the number of fragments produced.
    ///
    /// Empty text is stored but contributes no fragments. When indexing
    /// fails the store is put back to its previous content for `id`, so a
    /// failed document is never searchable.
    pub async fn ingest(&self, id: &str, text: &str) -> Result<usize> {
        let _guard = self.writer.lock().await;
        self.build_locked(true).await?;

        let previous = self.store.get(id).await.map_err(Error::Store)?;
        let doc = self.store.put(id, text).await.map_err(Error::Store)?;
        let fragments = self.chunker.fragments(&doc);
        if let Err(e) = self.index.replace_document(id, &fragments).await {
            warn!(document = id, error = %e, "indexing failed; restoring previous store entry");
            if let Err(rollback) = self.rollback(id, previous).await {
                // Store and index disagree now; force a rebuild on next use.
                warn!(document = id, error = %rollback, "store rollback failed");
                self.built.store(false, Ordering::Release);
            }
            return Err(e);
        }
        debug!(document = id, fragments = fragments.len(), "document indexed");
        Ok(fragments.len())
    }

    async fn rollback(&self, id: &str, previous: Option<Document>) -> Result<()> {
        match previous {
            Some(prev) => {
                self.store.put(id, &prev.text).await.map_err(Error::Store)?;
            }
            None => {
                self.store.remove(id).await.map_err(Error::Store)?;
            }
        }
        Ok(())
    }

    /// Forget a document and its fragments. `false` if it was unknown.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.writer.lock().await;
        self.build_locked(true).await?;

        let removed = self.store.remove(id).await.map_err(Error::Store)?;
        if removed {
            if let Err(e) = self.index.remove_document(id).await {
                self.built.store(false, Ordering::Release);
                return Err(e);
            }
        }
        Ok(removed)
    }

    /// Ranked fragments for `query` under the configured budget.
    ///
    /// An empty store yields an empty result rather than an error.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredFragment>> {
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_built().await?;
        self.retriever.retrieve(self.index.as_ref(), query).await
    }

    async fn context(&self, query: &str) -> Result<Vec<ScoredFragment>> {
        if self.store.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        self.ensure_built().await?;
        // Only empty extractions stored: nothing can be retrieved.
        if self.index.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let fragments = self.retrieve(query).await?;
        if fragments.is_empty() {
            return Err(Error::NoRelevantInformation);
        }
        Ok(fragments)
    }

    /// Answer `query` from the stored documents using `model`.
    ///
    /// Missing documents, irrelevant context, and provider failures come
    /// back as an [`Answer`] status. Only store or index infrastructure
    /// failures are returned as `Err`.
    pub async fn ask(&self, query: &str, model: &dyn LanguageModel) -> Result<Answer> {
        let notices = self.composer.notices();
        let sources = match self.context(query).await {
            Ok(fragments) => fragments,
            Err(Error::EmptyCorpus) => {
                return Ok(Answer::notice(AnswerStatus::NoDocuments, notices.no_documents))
            }
            Err(Error::NoRelevantInformation) => {
                return Ok(Answer::notice(
                    AnswerStatus::NoRelevantInfo,
                    notices.no_relevant_info,
                ))
            }
            Err(e) => return Err(e),
        };

        let system = self.composer.system_instructions();
        let prompt = self.composer.compose(query, &sources);
        match model.complete(&system, &prompt).await {
            Ok(reply) => {
                let reading = self.composer.interpret(&reply);
                let status = if reading.is_known {
                    AnswerStatus::Answered
                } else {
                    AnswerStatus::NoRelevantInfo
                };
                Ok(Answer {
                    status,
                    display_text: reading.display_text,
                    sources,
                })
            }
            Err(e) => {
                warn!(model = model.name(), error = %e, "language model call failed");
                Ok(Answer {
                    status: AnswerStatus::ProviderError,
                    display_text: format!("{} ({})", notices.provider_error, e.sanitized()),
                    sources,
                })
            }
        }
    }

    /// Stored documents with their fragment counts, in store order.
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let docs = self.store.get_all().await.map_err(Error::Store)?;
        Ok(docs
            .iter()
            .map(|doc| DocumentSummary {
                id: doc.id.clone(),
                chars: doc.text.chars().count(),
                fragments: self.chunker.fragments(doc).len(),
                ingested_at: doc.ingested_at,
            })
            .collect())
    }
}
