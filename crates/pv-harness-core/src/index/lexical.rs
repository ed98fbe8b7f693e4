//! TF-IDF lexical index with cosine similarity.
//!
//! Term weights are `tf × idf` with smoothed inverse document frequency
//! `idf(t) = ln((1 + N) / (1 + df(t))) + 1`, where `N` is the number of
//! fragments. Smoothing keeps a one-fragment corpus searchable (every term
//! weighs 1 instead of 0). Fragment vectors are L2-normalized at build time
//! so a query score is a plain dot product.
//!
//! Because any new fragment shifts the global IDF, every mutation builds a
//! complete new [`Snapshot`] off to the side and publishes it by swapping
//! one `Arc`. Readers clone the `Arc` and never observe a partial build.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

use super::{rank, FragmentIndex, IndexHit};
use crate::error::Result;
use crate::models::{Fragment, FragmentId};
use crate::text::tokenize;

struct Entry {
    fragment: Fragment,
    seq: u64,
    weights: HashMap<String, f64>,
}

#[derive(Default)]
struct Snapshot {
    entries: Vec<Entry>,
    idf: HashMap<String, f64>,
    next_seq: u64,
}

impl Snapshot {
    fn build(items: Vec<(Fragment, u64)>, next_seq: u64) -> Self {
        let tokenized: Vec<Vec<String>> = items.iter().map(|(f, _)| tokenize(&f.text)).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for terms in &tokenized {
            let mut seen: Vec<&str> = terms.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for t in seen {
                *df.entry(t).or_insert(0) += 1;
            }
        }

        let n = items.len() as f64;
        let idf: HashMap<String, f64> = df
            .into_iter()
            .map(|(t, d)| (t.to_string(), ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0))
            .collect();

        let entries = items
            .into_iter()
            .zip(tokenized.iter())
            .map(|((fragment, seq), terms)| Entry {
                fragment,
                seq,
                weights: weigh(terms, &idf),
            })
            .collect();

        Snapshot {
            entries,
            idf,
            next_seq,
        }
    }

    fn items(&self) -> Vec<(Fragment, u64)> {
        self.entries
            .iter()
            .map(|e| (e.fragment.clone(), e.seq))
            .collect()
    }
}

/// Normalized TF-IDF vector for a token list. Terms missing from `idf`
/// are ignored.
fn weigh(terms: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut tf: HashMap<&str, f64> = HashMap::new();
    for t in terms {
        *tf.entry(t.as_str()).or_insert(0.0) += 1.0;
    }

    let mut weights: HashMap<String, f64> = tf
        .into_iter()
        .filter_map(|(t, count)| idf.get(t).map(|w| (t.to_string(), count * w)))
        .collect();

    let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for w in weights.values_mut() {
            *w /= norm;
        }
    }
    weights
}

/// Lexical strategy: rebuilds on every mutation, swaps atomically.
#[derive(Default)]
pub struct LexicalIndex {
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, snapshot: Snapshot) {
        debug!(
            fragments = snapshot.entries.len(),
            vocabulary = snapshot.idf.len(),
            "lexical index rebuilt"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    /// Rebuild from the current items after `edit` has transformed them.
    fn mutate<F>(&self, edit: F)
    where
        F: FnOnce(Vec<(Fragment, u64)>, &mut u64) -> Vec<(Fragment, u64)>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let mut next_seq = current.next_seq;
        let items = edit(current.items(), &mut next_seq);
        self.publish(Snapshot::build(items, next_seq));
    }
}

fn append(items: &mut Vec<(Fragment, u64)>, fragments: &[Fragment], next_seq: &mut u64) {
    for f in fragments {
        items.push((f.clone(), *next_seq));
        *next_seq += 1;
    }
}

#[async_trait]
impl FragmentIndex for LexicalIndex {
    fn strategy(&self) -> &'static str {
        "lexical"
    }

    fn len(&self) -> usize {
        self.snapshot().entries.len()
    }

    fn fragment_ids(&self) -> Vec<FragmentId> {
        self.snapshot()
            .entries
            .iter()
            .map(|e| e.fragment.id.clone())
            .collect()
    }

    async fn rebuild(&self, fragments: &[Fragment]) -> Result<()> {
        self.mutate(|_, next_seq| {
            let mut items = Vec::with_capacity(fragments.len());
            *next_seq = 0;
            append(&mut items, fragments, next_seq);
            items
        });
        Ok(())
    }

    async fn add(&self, fragments: &[Fragment]) -> Result<()> {
        self.mutate(|mut items, next_seq| {
            append(&mut items, fragments, next_seq);
            items
        });
        Ok(())
    }

    async fn remove_document(&self, document: &str) -> Result<()> {
        self.mutate(|mut items, _| {
            items.retain(|(f, _)| f.id.document != document);
            items
        });
        Ok(())
    }

    async fn replace_document(&self, document: &str, fragments: &[Fragment]) -> Result<()> {
        self.mutate(|mut items, next_seq| {
            items.retain(|(f, _)| f.id.document != document);
            append(&mut items, fragments, next_seq);
            items
        });
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        let snapshot = self.snapshot();
        if snapshot.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_weights = weigh(&tokenize(text), &snapshot.idf);

        let hits = snapshot
            .entries
            .iter()
            .map(|e| {
                let score: f64 = query_weights
                    .iter()
                    .filter_map(|(t, qw)| e.weights.get(t).map(|w| w * qw))
                    .sum();
                IndexHit {
                    id: e.fragment.id.clone(),
                    text: e.fragment.text.clone(),
                    score,
                    seq: e.seq,
                }
            })
            .collect();

        Ok(rank(hits, k))
    }
}
