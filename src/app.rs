//! Assemble an [`Engine`] from configuration.

use anyhow::{Context, Result};
use std::sync::Arc;

use pv_harness_core::chunk::Chunker;
use pv_harness_core::compose::ContextComposer;
use pv_harness_core::index::{FragmentIndex, LexicalIndex, VectorIndex};
use pv_harness_core::retrieve::Retriever;
use pv_harness_core::store::DocumentStore;
use pv_harness_core::Engine;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::snapshot::FileSnapshotStore;
use crate::store_json::JsonFileStore;
use crate::store_sqlite::SqliteStore;

/// Open the configured document store.
pub async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    let path = config.store.resolved_path();
    let store: Arc<dyn DocumentStore> = match config.store.backend.as_str() {
        "sqlite" => Arc::new(
            SqliteStore::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        _ => Arc::new(
            JsonFileStore::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
    };
    Ok(store)
}

/// Build the configured index strategy (not yet populated).
pub fn build_index(config: &Config) -> Result<Arc<dyn FragmentIndex>> {
    let index: Arc<dyn FragmentIndex> = match config.index.strategy.as_str() {
        "vector" => {
            let embedder = create_embedder(&config.embedding)?;
            let snapshots = FileSnapshotStore::new(config.index.snapshot_dir.clone());
            Arc::new(VectorIndex::new(embedder).with_snapshots(Box::new(snapshots)))
        }
        _ => Arc::new(LexicalIndex::new()),
    };
    Ok(index)
}

pub fn build_composer(config: &Config) -> ContextComposer {
    let mut composer = ContextComposer::new(config.answer.language)
        .with_min_answer_chars(config.answer.min_answer_chars);
    if let Some(sentinel) = &config.answer.unknown_sentinel {
        composer = composer.with_sentinel(sentinel.clone());
    }
    composer
}

/// Open store and index and wire them into an engine. The index is built
/// lazily on first use.
pub async fn open_engine(config: &Config) -> Result<Engine> {
    let store = open_store(config).await?;
    let index = build_index(config)?;
    Ok(Engine::new(store, index)
        .with_chunker(Chunker::new(
            config.chunking.window_words,
            config.chunking.overlap_words,
        ))
        .with_retriever(Retriever {
            top_k: config.retrieval.top_k,
            max_total_chars: config.retrieval.max_total_chars,
            relevance_floor: config.retrieval.relevance_floor,
        })
        .with_composer(build_composer(config)))
}
