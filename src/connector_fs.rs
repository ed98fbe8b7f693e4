//! Filesystem document scan.
//!
//! Walks `[documents].root`, keeps files matching the include globs and not
//! the exclude globs, and returns them sorted by identity so ingestion order
//! is deterministic. A document's identity is its file name, the key the
//! document store uses, so the folder is treated as flat: when two
//! subfolders hold the same file name only the first path (in path order)
//! is kept and the others are reported.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::extract::content_type_for;

/// A file picked up by the scan, not yet extracted.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name, used as the document identity.
    pub identity: String,
    pub path: PathBuf,
    pub content_type: &'static str,
}

impl SourceFile {
    /// Describe an explicit path given on the command line.
    pub fn from_path(path: &Path) -> Result<Self> {
        let identity = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("not a file path: {}", path.display()))?;
        let content_type = content_type_for(&identity)
            .ok_or_else(|| anyhow::anyhow!("unsupported file type: {}", path.display()))?;
        Ok(Self {
            identity,
            path: path.to_path_buf(),
            content_type,
        })
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).with_context(|| format!("Failed to read {}", self.path.display()))
    }
}

pub fn scan_documents(config: &DocumentsConfig) -> Result<Vec<SourceFile>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Documents folder does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match SourceFile::from_path(path) {
            Ok(file) => files.push(file),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping file"),
        }
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.identity.cmp(&b.identity).then_with(|| a.path.cmp(&b.path)));

    let mut unique: Vec<SourceFile> = Vec::with_capacity(files.len());
    for file in files {
        match unique.last() {
            Some(kept) if kept.identity == file.identity => {
                tracing::warn!(
                    document = %file.identity,
                    kept = %kept.path.display(),
                    skipped = %file.path.display(),
                    "duplicate document name; skipping"
                );
            }
            _ => unique.push(file),
        }
    }

    Ok(unique)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
