//! Dense vector index with cosine similarity and incremental append.
//!
//! Fragments are embedded once, outside any lock; the finished entries are
//! then pushed under a single write lock, so a concurrent query sees either
//! none or all of a batch. Queries score by brute-force cosine similarity.
//!
//! # Snapshots
//!
//! When a [`SnapshotStore`] is attached, the index is saved after every
//! mutation as a [`VectorSnapshot`]: the vectors plus a parallel list of
//! fragment identities and content hashes. [`restore`](FragmentIndex::restore)
//! accepts a snapshot only if model, dimensionality, and every
//! `(identity, hash)` pair match the fragments it is asked to cover.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{rank, FragmentIndex, IndexHit};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::{Error, Result};
use crate::models::{Fragment, FragmentId};

const SNAPSHOT_MAGIC: &[u8; 4] = b"PVVI";
const SNAPSHOT_HEADER_LEN: usize = 12;

/// Identity line of a persisted vector, parallel to the vector rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: FragmentId,
    pub hash: String,
}

/// Persisted form of a [`VectorIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSnapshot {
    pub model: String,
    pub dims: usize,
    pub entries: Vec<SnapshotEntry>,
    pub vectors: Vec<Vec<f32>>,
}

impl VectorSnapshot {
    /// Encode the vectors as `PVVI | dims u32 | count u32 | f32 rows`.
    pub fn encode_vectors(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SNAPSHOT_HEADER_LEN + self.vectors.len() * self.dims * 4);
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.vectors.len() as u32).to_le_bytes());
        for v in &self.vectors {
            out.extend_from_slice(&vec_to_blob(v));
        }
        out
    }

    /// Decode rows written by [`encode_vectors`](Self::encode_vectors).
    pub fn decode_vectors(bytes: &[u8]) -> Result<(usize, Vec<Vec<f32>>)> {
        if bytes.len() < SNAPSHOT_HEADER_LEN || &bytes[..4] != SNAPSHOT_MAGIC {
            return Err(Error::IndexCorruption("bad vector file header".to_string()));
        }
        let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let body = &bytes[SNAPSHOT_HEADER_LEN..];
        if dims == 0 || body.len() != dims * count * 4 {
            return Err(Error::IndexCorruption(format!(
                "vector file holds {} bytes, expected {} rows of {} dims",
                body.len(),
                count,
                dims
            )));
        }
        let vectors = body.chunks_exact(dims * 4).map(blob_to_vec).collect();
        Ok((dims, vectors))
    }
}

/// Durable home for vector snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot; `Ok(None)` when none exists.
    fn load(&self) -> Result<Option<VectorSnapshot>>;
    fn save(&self, snapshot: &VectorSnapshot) -> Result<()>;
}

struct Entry {
    fragment: Fragment,
    seq: u64,
    vector: Vec<f32>,
}

#[derive(Default)]
struct State {
    entries: Vec<Arc<Entry>>,
    next_seq: u64,
}

/// Vector strategy over an [`Embedder`].
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    state: RwLock<State>,
    writer: Mutex<()>,
    snapshots: Option<Box<dyn SnapshotStore>>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            state: RwLock::new(State::default()),
            writer: Mutex::new(()),
            snapshots: None,
        }
    }

    /// Persist the index to `store` after every mutation.
    pub fn with_snapshots(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    async fn embed_fragments(&self, fragments: &[Fragment]) -> Result<Vec<Vec<f32>>> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(Error::Embedding)?;
        if vectors.len() != fragments.len() {
            return Err(Error::Embedding(anyhow::anyhow!(
                "embedder returned {} vectors for {} fragments",
                vectors.len(),
                fragments.len()
            )));
        }
        let dims = self.embedder.dims();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(Error::Embedding(anyhow::anyhow!(
                "embedder returned a {}-dim vector, expected {}",
                bad.len(),
                dims
            )));
        }
        Ok(vectors)
    }

    fn entries_from(
        fragments: &[Fragment],
        vectors: Vec<Vec<f32>>,
        next_seq: &mut u64,
    ) -> Vec<Arc<Entry>> {
        fragments
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(fragment, vector)| {
                let seq = *next_seq;
                *next_seq += 1;
                Arc::new(Entry {
                    fragment,
                    seq,
                    vector,
                })
            })
            .collect()
    }

    fn entries(&self) -> Vec<Arc<Entry>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    fn snapshot(&self) -> VectorSnapshot {
        let entries = self.entries();
        VectorSnapshot {
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
            entries: entries
                .iter()
                .map(|e| SnapshotEntry {
                    id: e.fragment.id.clone(),
                    hash: e.fragment.hash.clone(),
                })
                .collect(),
            vectors: entries.iter().map(|e| e.vector.clone()).collect(),
        }
    }

    fn persist(&self) {
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.save(&self.snapshot()) {
                warn!(error = %e, "failed to save vector index snapshot");
            }
        }
    }

    fn validate(&self, snap: &VectorSnapshot, fragments: &[Fragment]) -> Result<()> {
        if snap.model != self.embedder.model_name() || snap.dims != self.embedder.dims() {
            return Err(Error::IndexCorruption(format!(
                "snapshot built with {} ({} dims), embedder is {} ({} dims)",
                snap.model,
                snap.dims,
                self.embedder.model_name(),
                self.embedder.dims()
            )));
        }
        if snap.entries.len() != snap.vectors.len() || snap.entries.len() != fragments.len() {
            return Err(Error::IndexCorruption(format!(
                "snapshot covers {} fragments ({} vectors), store has {}",
                snap.entries.len(),
                snap.vectors.len(),
                fragments.len()
            )));
        }
        for (entry, fragment) in snap.entries.iter().zip(fragments) {
            if entry.id != fragment.id || entry.hash != fragment.hash {
                return Err(Error::IndexCorruption(format!(
                    "snapshot entry {} does not match fragment {}",
                    entry.id, fragment.id
                )));
            }
        }
        if snap.vectors.iter().any(|v| v.len() != snap.dims) {
            return Err(Error::IndexCorruption("ragged vector rows".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FragmentIndex for VectorIndex {
    fn strategy(&self) -> &'static str {
        "vector"
    }

    fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    fn fragment_ids(&self) -> Vec<FragmentId> {
        self.entries().iter().map(|e| e.fragment.id.clone()).collect()
    }

    async fn rebuild(&self, fragments: &[Fragment]) -> Result<()> {
        let _guard = self.writer.lock().await;
        let vectors = self.embed_fragments(fragments).await?;
        let mut next_seq = 0;
        let entries = Self::entries_from(fragments, vectors, &mut next_seq);
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = State { entries, next_seq };
        }
        debug!(fragments = fragments.len(), "vector index rebuilt");
        self.persist();
        Ok(())
    }

    async fn add(&self, fragments: &[Fragment]) -> Result<()> {
        let _guard = self.writer.lock().await;
        let vectors = self.embed_fragments(fragments).await?;
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let mut next_seq = state.next_seq;
            let new = Self::entries_from(fragments, vectors, &mut next_seq);
            state.entries.extend(new);
            state.next_seq = next_seq;
        }
        self.persist();
        Ok(())
    }

    async fn remove_document(&self, document: &str) -> Result<()> {
        let _guard = self.writer.lock().await;
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.entries.retain(|e| e.fragment.id.document != document);
        }
        self.persist();
        Ok(())
    }

    async fn replace_document(&self, document: &str, fragments: &[Fragment]) -> Result<()> {
        let _guard = self.writer.lock().await;
        let vectors = self.embed_fragments(fragments).await?;
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.entries.retain(|e| e.fragment.id.document != document);
            let mut next_seq = state.next_seq;
            let new = Self::entries_from(fragments, vectors, &mut next_seq);
            state.entries.extend(new);
            state.next_seq = next_seq;
        }
        self.persist();
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        let entries = self.entries();
        if entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await
            .map_err(Error::Embedding)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding(anyhow::anyhow!("empty embedding response")))?;

        let hits = entries
            .iter()
            .map(|e| IndexHit {
                id: e.fragment.id.clone(),
                text: e.fragment.text.clone(),
                score: cosine_similarity(&query_vec, &e.vector) as f64,
                seq: e.seq,
            })
            .collect();

        Ok(rank(hits, k))
    }

    async fn restore(&self, fragments: &[Fragment]) -> Result<bool> {
        let Some(store) = &self.snapshots else {
            return Ok(false);
        };

        let snap = match store.load() {
            Ok(Some(snap)) => snap,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!(error = %e, "discarding unreadable vector index snapshot");
                return Ok(false);
            }
        };

        if let Err(e) = self.validate(&snap, fragments) {
            warn!(error = %e, "discarding stale vector index snapshot");
            return Ok(false);
        }

        let _guard = self.writer.lock().await;
        let mut next_seq = 0;
        let entries = Self::entries_from(fragments, snap.vectors, &mut next_seq);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = State { entries, next_seq };
        debug!(fragments = fragments.len(), "vector index restored from snapshot");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    #[derive(Default)]
    struct MemorySnapshots {
        saved: std::sync::Mutex<Option<VectorSnapshot>>,
    }

    impl SnapshotStore for Arc<MemorySnapshots> {
        fn load(&self) -> Result<Option<VectorSnapshot>> {
            Ok(self.saved.lock().unwrap().clone())
        }
        fn save(&self, snapshot: &VectorSnapshot) -> Result<()> {
            *self.saved.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    fn frag(doc: &str, ordinal: usize, text: &str) -> Fragment {
        Fragment::new(FragmentId::new(doc, ordinal), text, 0)
    }

    fn index() -> VectorIndex {
        VectorIndex::new(Arc::new(HashingEmbedder::new(128)))
    }

    #[tokio::test]
    async fn test_empty_index_query() {
        assert!(index().query("paneles", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incremental_add_keeps_existing_entries() {
        let idx = index();
        idx.add(&[frag("a.pdf", 0, "paneles solares de silicio")])
            .await
            .unwrap();
        idx.add(&[frag("b.pdf", 0, "inversores de string")])
            .await
            .unwrap();
        assert_eq!(idx.len(), 2);
        let hits = idx.query("paneles solares", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id.document, "a.pdf");
    }

    #[tokio::test]
    async fn test_replace_document_drops_old_vectors() {
        let idx = index();
        idx.rebuild(&[
            frag("a.pdf", 0, "texto viejo"),
            frag("a.pdf", 1, "más texto viejo"),
            frag("b.pdf", 0, "otro documento"),
        ])
        .await
        .unwrap();
        idx.replace_document("a.pdf", &[frag("a.pdf", 0, "texto nuevo")])
            .await
            .unwrap();
        assert_eq!(
            idx.fragment_ids(),
            vec![FragmentId::new("b.pdf", 0), FragmentId::new("a.pdf", 0)]
        );
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_restores() {
        let store = Arc::new(MemorySnapshots::default());
        let frags = vec![frag("a.pdf", 0, "radiación solar"), frag("a.pdf", 1, "sombras")];

        let idx = index().with_snapshots(Box::new(store.clone()));
        idx.rebuild(&frags).await.unwrap();
        let before = idx.query("radiación", 2).await.unwrap();

        let restored = index().with_snapshots(Box::new(store.clone()));
        assert!(restored.restore(&frags).await.unwrap());
        assert_eq!(restored.query("radiación", 2).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_stale_snapshot_rejected() {
        let store = Arc::new(MemorySnapshots::default());
        let idx = index().with_snapshots(Box::new(store.clone()));
        idx.rebuild(&[frag("a.pdf", 0, "radiación solar")]).await.unwrap();

        let changed = vec![frag("a.pdf", 0, "radiación solar directa")];
        let restored = index().with_snapshots(Box::new(store.clone()));
        assert!(!restored.restore(&changed).await.unwrap());
        assert!(restored.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_from_other_model_rejected() {
        let store = Arc::new(MemorySnapshots::default());
        let frags = vec![frag("a.pdf", 0, "radiación solar")];
        index()
            .with_snapshots(Box::new(store.clone()))
            .rebuild(&frags)
            .await
            .unwrap();

        let other = VectorIndex::new(Arc::new(HashingEmbedder::new(64)))
            .with_snapshots(Box::new(store.clone()));
        assert!(!other.restore(&frags).await.unwrap());
    }

    #[test]
    fn test_vector_file_codec() {
        let snap = VectorSnapshot {
            model: "hashing".to_string(),
            dims: 2,
            entries: Vec::new(),
            vectors: vec![vec![1.0, -0.5], vec![0.25, 2.0]],
        };
        let (dims, vectors) = VectorSnapshot::decode_vectors(&snap.encode_vectors()).unwrap();
        assert_eq!(dims, 2);
        assert_eq!(vectors, snap.vectors);
    }

    #[test]
    fn test_truncated_vector_file_is_corruption() {
        let snap = VectorSnapshot {
            model: "hashing".to_string(),
            dims: 3,
            entries: Vec::new(),
            vectors: vec![vec![1.0, 2.0, 3.0]],
        };
        let mut bytes = snap.encode_vectors();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            VectorSnapshot::decode_vectors(&bytes),
            Err(Error::IndexCorruption(_))
        ));
        assert!(VectorSnapshot::decode_vectors(b"nope").is_err());
    }

    /// (id, text) pairs, sorted.
    fn corpus_view(hits: &[IndexHit]) -> Vec<(FragmentId, String)> {
        let mut view: Vec<_> = hits.iter().map(|h| (h.id.clone(), h.text.clone())).collect();
        view.sort();
        view
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_see_whole_states() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let before = vec![
            frag("a.pdf", 0, "Panel solar monocristalino de alta eficiencia."),
            frag("a.pdf", 1, "Inversor solar conectado a la red."),
            frag("b.pdf", 0, "Batería solar de litio."),
        ];
        let b_after = vec![
            frag("b.pdf", 0, "Regulador solar de carga."),
            frag("b.pdf", 1, "Cableado solar de corriente continua."),
        ];
        let mut after = before[..2].to_vec();
        after.extend(b_after.iter().cloned());

        let view = |frags: &[Fragment]| {
            let mut v: Vec<_> = frags.iter().map(|f| (f.id.clone(), f.text.clone())).collect();
            v.sort();
            v
        };
        let (before_view, after_view) = (view(&before), view(&after));

        let idx = Arc::new(index());
        idx.rebuild(&before).await.unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let mut readers = Vec::new();
        for _ in 0..3 {
            let idx = Arc::clone(&idx);
            let done = Arc::clone(&done);
            let (before_view, after_view) = (before_view.clone(), after_view.clone());
            readers.push(tokio::spawn(async move {
                let mut seen = 0;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let len = idx.len();
                    assert!(len == 3 || len == 4, "observed partial length {}", len);
                    let hits = corpus_view(&idx.query("solar", 100).await.unwrap());
                    assert!(
                        hits == before_view || hits == after_view,
                        "observed partial state: {:?}",
                        hits
                    );
                    seen += 1;
                    if finished {
                        break seen;
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        for _ in 0..200 {
            idx.rebuild(&before).await.unwrap();
            idx.replace_document("b.pdf", &b_after).await.unwrap();
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.await.unwrap() > 0);
        }
        assert_eq!(idx.len(), 4);
    }
}
