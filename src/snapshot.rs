//! On-disk vector index snapshots.
//!
//! Two files in `[index].snapshot_dir`, always loaded together:
//!
//! | File | Content |
//! |------|---------|
//! | `vectors.bin` | `PVVI` magic, dims (u32 LE), count (u32 LE), then `count × dims` f32 LE |
//! | `vectors.ids.json` | `{ "model", "dims", "entries": [{ "id": {document, ordinal}, "hash" }] }` |
//!
//! Anything inconsistent (one file missing, counts or dims disagreeing,
//! unparsable JSON) loads as [`Error::IndexCorruption`]; the index then
//! discards the snapshot and rebuilds from the document store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use pv_harness_core::error::{Error, Result};
use pv_harness_core::index::{SnapshotEntry, SnapshotStore, VectorSnapshot};

const VECTORS_FILE: &str = "vectors.bin";
const IDS_FILE: &str = "vectors.ids.json";

#[derive(Serialize, Deserialize)]
struct IdsFile {
    model: String,
    dims: usize,
    entries: Vec<SnapshotEntry>,
}

pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    fn ids_path(&self) -> PathBuf {
        self.dir.join(IDS_FILE)
    }
}

fn corruption<E: std::fmt::Display>(what: E) -> Error {
    Error::IndexCorruption(what.to_string())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)
        .and_then(|_| std::fs::rename(&tmp, path))
        .map_err(|e| Error::Store(anyhow::anyhow!("writing {}: {}", path.display(), e)))
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<VectorSnapshot>> {
        let (vectors_path, ids_path) = (self.vectors_path(), self.ids_path());
        match (vectors_path.exists(), ids_path.exists()) {
            (false, false) => return Ok(None),
            (true, true) => {}
            _ => return Err(corruption("only one of vectors.bin / vectors.ids.json exists")),
        }

        let bytes = std::fs::read(&vectors_path).map_err(corruption)?;
        let ids_raw = std::fs::read_to_string(&ids_path).map_err(corruption)?;
        let ids: IdsFile = serde_json::from_str(&ids_raw).map_err(corruption)?;

        let (dims, vectors) = VectorSnapshot::decode_vectors(&bytes)?;
        if dims != ids.dims {
            return Err(corruption(format!(
                "vectors.bin has {} dims, ids file says {}",
                dims, ids.dims
            )));
        }
        if vectors.len() != ids.entries.len() {
            return Err(corruption(format!(
                "vectors.bin has {} rows, ids file lists {}",
                vectors.len(),
                ids.entries.len()
            )));
        }

        Ok(Some(VectorSnapshot {
            model: ids.model,
            dims,
            entries: ids.entries,
            vectors,
        }))
    }

    fn save(&self, snapshot: &VectorSnapshot) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Store(anyhow::anyhow!("creating {}: {}", self.dir.display(), e)))?;
        let ids = IdsFile {
            model: snapshot.model.clone(),
            dims: snapshot.dims,
            entries: snapshot.entries.clone(),
        };
        let ids_json = serde_json::to_vec_pretty(&ids).map_err(|e| Error::Store(e.into()))?;
        write_atomic(&self.vectors_path(), &snapshot.encode_vectors())?;
        write_atomic(&self.ids_path(), &ids_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_harness_core::models::FragmentId;
    use tempfile::TempDir;

    fn snapshot() -> VectorSnapshot {
        VectorSnapshot {
            model: "hashing".to_string(),
            dims: 3,
            entries: vec![
                SnapshotEntry {
                    id: FragmentId::new("a.pdf", 0),
                    hash: "h0".to_string(),
                },
                SnapshotEntry {
                    id: FragmentId::new("a.pdf", 1),
                    hash: "h1".to_string(),
                },
            ],
            vectors: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.5, 0.5]],
        }
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(tmp.path().join("index"));
        store.save(&snapshot()).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot()));
    }

    #[test]
    fn test_nothing_saved_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(FileSnapshotStore::new(tmp.path()).load().unwrap().is_none());
    }

    #[test]
    fn test_missing_half_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(tmp.path());
        store.save(&snapshot()).unwrap();
        std::fs::remove_file(tmp.path().join(IDS_FILE)).unwrap();
        assert!(matches!(store.load(), Err(Error::IndexCorruption(_))));
    }

    #[test]
    fn test_row_count_mismatch_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(tmp.path());
        let mut snap = snapshot();
        store.save(&snap).unwrap();
        snap.vectors.pop();
        std::fs::write(tmp.path().join(VECTORS_FILE), snap.encode_vectors()).unwrap();
        assert!(matches!(store.load(), Err(Error::IndexCorruption(_))));
    }
}
