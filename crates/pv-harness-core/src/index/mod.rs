//! Searchable representations over all fragments.
//!
//! Two interchangeable strategies implement [`FragmentIndex`]:
//!
//! | Strategy | Type | `add` | Similarity |
//! |----------|------|-------|------------|
//! | lexical | [`LexicalIndex`] | full rebuild (IDF is corpus-wide) | cosine over TF-IDF weights |
//! | vector | [`VectorIndex`] | true append | cosine over dense embeddings |
//!
//! Both publish changes atomically: a concurrent [`query`](FragmentIndex::query)
//! sees either the state before a mutation or the state after it.

pub mod lexical;
pub mod vector;

use async_trait::async_trait;
use std::cmp::Ordering;

use crate::error::Result;
use crate::models::{Fragment, FragmentId};

pub use lexical::LexicalIndex;
pub use vector::{SnapshotEntry, SnapshotStore, VectorIndex, VectorSnapshot};

/// One ranked index match.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: FragmentId,
    pub text: String,
    pub score: f64,
    /// Insertion sequence; lower means ingested earlier.
    pub seq: u64,
}

/// Capability set shared by every index strategy.
#[async_trait]
pub trait FragmentIndex: Send + Sync {
    /// Short strategy name, `"lexical"` or `"vector"`.
    fn strategy(&self) -> &'static str;

    /// Number of fragments currently indexed.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities of all indexed fragments, in insertion order.
    fn fragment_ids(&self) -> Vec<FragmentId>;

    /// Replace the whole index with `fragments`, in the given order.
    async fn rebuild(&self, fragments: &[Fragment]) -> Result<()>;

    /// Append fragments after everything already indexed.
    async fn add(&self, fragments: &[Fragment]) -> Result<()>;

    /// Drop every fragment belonging to `document`.
    async fn remove_document(&self, document: &str) -> Result<()>;

    /// Atomically swap a document's fragments for a new set. On error the
    /// index is left as it was.
    async fn replace_document(&self, document: &str, fragments: &[Fragment]) -> Result<()>;

    /// Top `k` fragments for `text`, best first. Returns fewer than `k`
    /// when fewer are indexed and nothing when the index is empty.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>>;

    /// Load persisted state if it matches `fragments` exactly.
    ///
    /// Returns `Ok(false)` when nothing usable was found; the caller is
    /// then expected to [`rebuild`](FragmentIndex::rebuild).
    async fn restore(&self, _fragments: &[Fragment]) -> Result<bool> {
        Ok(false)
    }
}

/// Sort hits by score (desc), then insertion order (asc), and keep `k`.
pub fn rank(mut hits: Vec<IndexHit>, k: usize) -> Vec<IndexHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.seq.cmp(&b.seq))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc: &str, score: f64, seq: u64) -> IndexHit {
        IndexHit {
            id: FragmentId::new(doc, 0),
            text: String::new(),
            score,
            seq,
        }
    }

    #[test]
    fn test_rank_orders_by_score_then_seq() {
        let ranked = rank(
            vec![hit("c", 0.5, 2), hit("a", 0.9, 5), hit("b", 0.5, 1)],
            10,
        );
        let docs: Vec<&str> = ranked.iter().map(|h| h.id.document.as_str()).collect();
        assert_eq!(docs, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rank_truncates() {
        let ranked = rank(vec![hit("a", 0.1, 0), hit("b", 0.2, 1)], 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id.document, "b");
    }
}
