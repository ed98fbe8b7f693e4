//! Ranked retrieval under a character budget.
//!
//! # Selection
//!
//! 1. Ask the index for the top `top_k` fragments.
//! 2. Drop fragments scoring at or below `relevance_floor`.
//! 3. Drop fragments whose whitespace-normalized text repeats a
//!    higher-ranked one (dedup is per fragment, so several fragments of one
//!    document may survive).
//! 4. Walk the ranking and keep fragments while the running character count
//!    stays within `max_total_chars`. The first fragment that does not fit
//!    ends the walk; fragments are never cut mid-text.

use std::collections::HashSet;

use crate::error::Result;
use crate::index::{FragmentIndex, IndexHit};
use crate::models::ScoredFragment;
use crate::text::collapse_whitespace;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MAX_TOTAL_CHARS: usize = 2000;

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retriever {
    pub top_k: usize,
    pub max_total_chars: usize,
    /// Minimum score a fragment must exceed to count as relevant.
    pub relevance_floor: f64,
}

impl Default for Retriever {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_total_chars: DEFAULT_MAX_TOTAL_CHARS,
            relevance_floor: 0.0,
        }
    }
}

impl Retriever {
    /// Query `index` and select fragments for the prompt, best first.
    ///
    /// An empty result means "no relevant information".
    pub async fn retrieve(
        &self,
        index: &dyn FragmentIndex,
        query: &str,
    ) -> Result<Vec<ScoredFragment>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let hits = index.query(query, self.top_k).await?;
        Ok(self.select(hits))
    }

    /// Apply floor, dedup, and budget to already-ranked hits.
    pub fn select(&self, hits: Vec<IndexHit>) -> Vec<ScoredFragment> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut used = 0usize;
        let mut out = Vec::new();

        for hit in hits {
            if hit.score <= self.relevance_floor {
                continue;
            }
            if !seen.insert(collapse_whitespace(&hit.text)) {
                continue;
            }
            let len = hit.text.chars().count();
            if used + len > self.max_total_chars {
                break;
            }
            used += len;
            out.push(ScoredFragment {
                document: hit.id.document,
                ordinal: hit.id.ordinal,
                text: hit.text,
                score: hit.score,
            });
        }

        out
    }
}
