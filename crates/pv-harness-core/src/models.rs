//! Core data models shared by every stage of the retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// An extracted source document, keyed by its file name.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ingested_at: Utc::now(),
        }
    }
}

/// Identity of a fragment: parent document plus ordinal position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentId {
    pub document: String,
    pub ordinal: usize,
}

impl FragmentId {
    pub fn new(document: impl Into<String>, ordinal: usize) -> Self {
        Self {
            document: document.into(),
            ordinal,
        }
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.ordinal)
    }
}

/// A bounded span of a document's text; the unit of scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub id: FragmentId,
    pub text: String,
    /// Number of leading words repeated from the previous fragment.
    pub overlap_words: usize,
    /// SHA-256 of `text`, used to validate persisted embeddings.
    pub hash: String,
}

impl Fragment {
    pub fn new(id: FragmentId, text: impl Into<String>, overlap_words: usize) -> Self {
        let text = text.into();
        let hash = content_hash(&text);
        Self {
            id,
            text,
            overlap_words,
            hash,
        }
    }
}

/// A fragment scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFragment {
    pub document: String,
    pub ordinal: usize,
    pub text: String,
    pub score: f64,
}

/// Hex-encoded SHA-256 of a string.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_hash_tracks_text() {
        let a = Fragment::new(FragmentId::new("a.pdf", 0), "luz solar", 0);
        let b = Fragment::new(FragmentId::new("b.pdf", 3), "luz solar", 0);
        let c = Fragment::new(FragmentId::new("a.pdf", 0), "luz lunar", 0);
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
    }

    #[test]
    fn test_fragment_id_display() {
        assert_eq!(FragmentId::new("manual.pdf", 4).to_string(), "manual.pdf#4");
    }
}
