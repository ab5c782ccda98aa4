//! `VectorFile`: a dense, append-only array of fixed-width `f32`
//! vectors (`<stem>.vec`) plus a parallel array mapping each slot to
//! the relational row it embeds (`<stem>.id`), with deletions tracked
//! by a tombstone set rather than an in-place rewrite.
//!
//! Invariants maintained by every public method:
//! - the `.vec` and `.id` files always hold the same number of slots
//! - every vector written has exactly the file's declared dimension
//! - a tombstoned slot is never returned by `iter_live`
//! - `compact` leaves a dense, tombstone-free file with no gaps

use super::tombstone::Tombstones;
use crate::error::Error;
use crate::error::Result;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

struct Inner {
    vectors: Vec<f32>,
    row_ids: Vec<i64>,
    row_to_slot: HashMap<i64, u64>,
    tombstones: Tombstones,
}

/// A vector file handle. Appends are serialized through `write_lock`;
/// reads (including the whole-file scan `vector_search` performs) take
/// a shared `RwLock` read guard so concurrent readers never block each
/// other.
pub struct VectorFile {
    vec_path: PathBuf,
    id_path: PathBuf,
    dimension: usize,
    inner: RwLock<Inner>,
    write_lock: Mutex<()>,
}

impl VectorFile {
    /// Open (creating if absent) the `.vec`/`.id`/`.tomb.json` triplet
    /// rooted at `stem`.
    pub fn open(stem: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let stem = stem.as_ref();
        let vec_path = stem.with_extension("vec");
        let id_path = stem.with_extension("id");
        let tomb_path = stem.with_extension("tomb.json");

        let vectors = read_vectors(&vec_path, dimension)?;
        let row_ids = read_ids(&id_path)?;

        if vectors.len() / dimension.max(1) != row_ids.len() {
            return Err(Error::ConsistencyError {
                message: format!(
                    "vector file `{}` has {} vector slots but {} id slots",
                    vec_path.display(),
                    if dimension == 0 { 0 } else { vectors.len() / dimension },
                    row_ids.len()
                ),
                hint: crate::error::RemediationHint::Reconcile,
            });
        }

        let tombstones = Tombstones::load(&tomb_path)?;
        let mut row_to_slot = HashMap::new();
        for (slot, row_id) in row_ids.iter().enumerate() {
            row_to_slot.insert(*row_id, slot as u64);
        }

        Ok(VectorFile {
            vec_path,
            id_path,
            dimension,
            inner: RwLock::new(Inner {
                vectors,
                row_ids,
                row_to_slot,
                tombstones,
            }),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Append `vector` for `row_id`, returning the slot it landed in.
    /// Overwrites any prior mapping for `row_id` by tombstoning its old
    /// slot first, so re-embedding a row never leaves two live copies.
    pub fn append(&self, row_id: i64, vector: &[f32]) -> Result<u64> {
        if vector.len() != self.dimension {
            return Err(Error::SchemaError(format!(
                "vector has dimension {}, column expects {}",
                vector.len(),
                self.dimension
            )));
        }
        let _guard = self.write_lock.lock().unwrap();
        let mut inner = self.inner.write().unwrap();
        if let Some(&old_slot) = inner.row_to_slot.get(&row_id) {
            inner.tombstones.insert(old_slot)?;
        }
        let slot = inner.row_ids.len() as u64;
        inner.vectors.extend_from_slice(vector);
        inner.row_ids.push(row_id);
        inner.row_to_slot.insert(row_id, slot);
        append_vector_to_disk(&self.vec_path, vector)?;
        append_id_to_disk(&self.id_path, row_id)?;
        Ok(slot)
    }

    /// Tombstone the slot holding `row_id`, if any. Idempotent.
    pub fn mark_deleted(&self, row_id: i64) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(&slot) = inner.row_to_slot.get(&row_id) {
            inner.tombstones.insert(slot)?;
        }
        Ok(())
    }

    /// Iterate `(row_id, vector)` for every slot not tombstoned.
    pub fn iter_live(&self) -> Vec<(i64, Vec<f32>)> {
        let inner = self.inner.read().unwrap();
        let mut out = Vec::new();
        for (slot, row_id) in inner.row_ids.iter().enumerate() {
            if inner.tombstones.contains(slot as u64) {
                continue;
            }
            let start = slot * self.dimension;
            out.push((*row_id, inner.vectors[start..start + self.dimension].to_vec()));
        }
        out
    }

    pub fn live_count(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner.row_ids.len() - inner.tombstones.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.inner.read().unwrap().tombstones.len()
    }

    /// Rewrite `.vec`/`.id` to contain only live slots, in slot order,
    /// then clear the tombstone set. Crash-safe: both files are
    /// written to `.tmp` siblings, fsynced, and atomically renamed into
    /// place before the tombstone file is cleared.
    pub fn compact(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut inner = self.inner.write().unwrap();
        let tombstoned = inner.tombstones.len();
        tracing::info!(
            path = %self.vec_path.display(),
            live = inner.row_ids.len() - tombstoned,
            tombstoned,
            "compacting vector file"
        );

        let mut new_vectors = Vec::new();
        let mut new_ids = Vec::new();
        for (slot, row_id) in inner.row_ids.iter().enumerate() {
            if inner.tombstones.contains(slot as u64) {
                continue;
            }
            let start = slot * self.dimension;
            new_vectors.extend_from_slice(&inner.vectors[start..start + self.dimension]);
            new_ids.push(*row_id);
        }

        write_vectors_atomic(&self.vec_path, &new_vectors)?;
        write_ids_atomic(&self.id_path, &new_ids)?;

        let mut row_to_slot = HashMap::new();
        for (slot, row_id) in new_ids.iter().enumerate() {
            row_to_slot.insert(*row_id, slot as u64);
        }

        inner.vectors = new_vectors;
        inner.row_ids = new_ids;
        inner.row_to_slot = row_to_slot;
        inner.tombstones.clear()?;

        Ok(())
    }
}

fn read_vectors(path: &Path, dimension: usize) -> Result<Vec<f32>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut data = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut data)?;
    if dimension > 0 && data.len() % (dimension * 4) != 0 {
        return Err(Error::ConsistencyError {
            message: format!("vector file `{}` length is not a multiple of its dimension", path.display()),
            hint: crate::error::RemediationHint::Reconcile,
        });
    }
    Ok(data
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_ids(path: &Path) -> Result<Vec<i64>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut data = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut data)?;
    Ok(data
        .chunks_exact(8)
        .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
        .collect())
}

fn append_vector_to_disk(path: &Path, vector: &[f32]) -> Result<()> {
    let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    for v in vector {
        f.write_all(&v.to_le_bytes())?;
    }
    f.sync_all()?;
    Ok(())
}

fn append_id_to_disk(path: &Path, row_id: i64) -> Result<()> {
    let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(&row_id.to_le_bytes())?;
    f.sync_all()?;
    Ok(())
}

fn write_vectors_atomic(path: &Path, vectors: &[f32]) -> Result<()> {
    let tmp_path = path.with_extension("vec.tmp");
    let mut tmp = std::fs::File::create(&tmp_path)?;
    for v in vectors {
        tmp.write_all(&v.to_le_bytes())?;
    }
    tmp.sync_all()?;
    drop(tmp);
    std::fs::rename(&tmp_path, path)?;
    fsync_parent(path);
    Ok(())
}

fn write_ids_atomic(path: &Path, ids: &[i64]) -> Result<()> {
    let tmp_path = path.with_extension("id.tmp");
    let mut tmp = std::fs::File::create(&tmp_path)?;
    for id in ids {
        tmp.write_all(&id.to_le_bytes())?;
    }
    tmp.sync_all()?;
    drop(tmp);
    std::fs::rename(&tmp_path, path)?;
    fsync_parent(path);
    Ok(())
}

fn fsync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_iter_live() {
        let dir = tempdir().unwrap();
        let vf = VectorFile::open(dir.path().join("docs__embedding"), 3).unwrap();
        vf.append(1, &[1.0, 0.0, 0.0]).unwrap();
        vf.append(2, &[0.0, 1.0, 0.0]).unwrap();

        let live = vf.iter_live();
        assert_eq!(live.len(), 2);
        assert_eq!(vf.live_count(), 2);
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let dir = tempdir().unwrap();
        let vf = VectorFile::open(dir.path().join("docs__embedding"), 3).unwrap();
        let err = vf.append(1, &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::SchemaError(_)));
    }

    #[test]
    fn test_mark_deleted_excludes_from_iter_live() {
        let dir = tempdir().unwrap();
        let vf = VectorFile::open(dir.path().join("docs__embedding"), 2).unwrap();
        vf.append(1, &[1.0, 1.0]).unwrap();
        vf.append(2, &[2.0, 2.0]).unwrap();

        vf.mark_deleted(1).unwrap();
        let live = vf.iter_live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, 2);
        assert_eq!(vf.tombstone_count(), 1);
    }

    #[test]
    fn test_mark_deleted_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let vf = VectorFile::open(dir.path().join("docs__embedding"), 2).unwrap();
        vf.append(1, &[1.0, 1.0]).unwrap();
        vf.mark_deleted(1).unwrap();
        vf.mark_deleted(1).unwrap();
        assert_eq!(vf.tombstone_count(), 1);
    }

    #[test]
    fn test_compact_reclaims_tombstoned_slots() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("docs__embedding");
        let vf = VectorFile::open(&stem, 2).unwrap();
        vf.append(1, &[1.0, 1.0]).unwrap();
        vf.append(2, &[2.0, 2.0]).unwrap();
        vf.append(3, &[3.0, 3.0]).unwrap();
        vf.mark_deleted(2).unwrap();

        vf.compact().unwrap();
        assert_eq!(vf.tombstone_count(), 0);
        assert_eq!(vf.live_count(), 2);

        let live = vf.iter_live();
        let ids: Vec<i64> = live.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_reopen_reads_persisted_data() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("docs__embedding");
        {
            let vf = VectorFile::open(&stem, 2).unwrap();
            vf.append(1, &[1.0, 2.0]).unwrap();
        }
        let reopened = VectorFile::open(&stem, 2).unwrap();
        assert_eq!(reopened.live_count(), 1);
    }

    #[test]
    fn test_append_overwrites_prior_slot_for_same_row() {
        let dir = tempdir().unwrap();
        let vf = VectorFile::open(dir.path().join("docs__embedding"), 2).unwrap();
        vf.append(1, &[1.0, 1.0]).unwrap();
        vf.append(1, &[9.0, 9.0]).unwrap();

        let live = vf.iter_live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].1, vec![9.0, 9.0]);
    }
}
