//! Ingestion pipeline.
//!
//! Each document is handled on its own: read → extract → [`Engine::ingest`].
//! An unreadable or unparsable document, or one the embedder rejects, is
//! logged and skipped without touching the rest of the batch. A document whose extraction is empty
//! (e.g. a scanned PDF) is stored but contributes no fragments.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use pv_harness_core::chunk::Chunker;
use pv_harness_core::models::Document;
use pv_harness_core::{Engine, Error};

use crate::app::open_engine;
use crate::config::Config;
use crate::connector_fs::{scan_documents, SourceFile};
use crate::extract::{extract_text, extract_text_blocking};

/// Counts reported at the end of an ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub found: usize,
    pub ingested: usize,
    pub empty: usize,
    pub skipped: usize,
    pub fragments: usize,
}

/// Extract `bytes` and ingest the text under `identity`.
///
/// Returns the number of fragments indexed. Extraction failures come back
/// as [`Error::Ingestion`]. Extraction runs on the blocking pool.
pub async fn ingest_bytes(
    engine: &Engine,
    identity: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<usize, Error> {
    let text = extract_text_blocking(bytes, content_type.to_string())
        .await
        .map_err(|e| Error::ingestion(identity, e))?;
    engine.ingest(identity, &text).await
}

/// Ingest `files` one by one into `engine`.
pub async fn ingest_files(engine: &Engine, files: &[SourceFile]) -> Result<IngestSummary> {
    let mut summary = IngestSummary {
        found: files.len(),
        ..IngestSummary::default()
    };

    for file in files {
        let bytes = match file.read() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(document = %file.identity, error = %e, "skipping unreadable document");
                summary.skipped += 1;
                continue;
            }
        };

        match ingest_bytes(engine, &file.identity, bytes, file.content_type).await {
            Ok(0) => {
                warn!(document = %file.identity, "no text extracted; document contributes no fragments");
                summary.empty += 1;
            }
            Ok(n) => {
                summary.ingested += 1;
                summary.fragments += n;
            }
            Err(e @ Error::Ingestion { .. }) => {
                warn!(error = %e, "skipping document");
                summary.skipped += 1;
            }
            Err(Error::Embedding(e)) => {
                warn!(document = %file.identity, error = %e, "embedding failed; skipping document");
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        ingested = summary.ingested,
        empty = summary.empty,
        skipped = summary.skipped,
        fragments = summary.fragments,
        "ingestion finished"
    );
    Ok(summary)
}

fn collect_files(config: &Config, paths: &[PathBuf]) -> Result<(Vec<SourceFile>, usize)> {
    if paths.is_empty() {
        return Ok((scan_documents(&config.documents)?, 0));
    }
    let mut files = Vec::new();
    let mut rejected = 0;
    for path in paths {
        match SourceFile::from_path(path) {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!(error = %e, "skipping path");
                rejected += 1;
            }
        }
    }
    Ok((files, rejected))
}

/// `pvh ingest [PATHS..] [--dry-run]`
pub async fn run_ingest(config: &Config, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    let (files, rejected) = collect_files(config, paths)?;

    if dry_run {
        let chunker = Chunker::new(config.chunking.window_words, config.chunking.overlap_words);
        let mut fragments = 0;
        let mut unreadable = 0;
        for file in &files {
            let text = file
                .read()
                .ok()
                .and_then(|bytes| extract_text(&bytes, file.content_type).ok());
            match text {
                Some(text) => fragments += chunker.fragments(&Document::new(&file.identity, text)).len(),
                None => unreadable += 1,
            }
        }
        println!("ingest (dry-run)");
        println!("  documents found: {}", files.len() + rejected);
        println!("  unreadable: {}", unreadable + rejected);
        println!("  estimated fragments: {}", fragments);
        return Ok(());
    }

    let engine = open_engine(config).await?;
    let mut summary = ingest_files(&engine, &files).await?;
    summary.found += rejected;
    summary.skipped += rejected;

    println!("ingest");
    println!("  documents found: {}", summary.found);
    println!("  ingested: {}", summary.ingested);
    println!("  empty (no text): {}", summary.empty);
    println!("  skipped: {}", summary.skipped);
    println!("  fragments: {}", summary.fragments);
    println!("ok");
    Ok(())
}

/// `pvh reindex`
pub async fn run_reindex(config: &Config) -> Result<()> {
    let engine = open_engine(config).await?;
    let fragments = engine.reindex().await?;
    println!("reindex");
    println!("  strategy: {}", engine.index().strategy());
    println!("  documents: {}", engine.store().len());
    println!("  fragments: {}", fragments);
    println!("ok");
    Ok(())
}
