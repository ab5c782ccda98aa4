//! The `.tomb.json` sidecar: the set of slots a `VectorFile` has
//! logically deleted but not yet reclaimed by `compact`.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct TombstoneFile {
    deleted_slots: Vec<u64>,
}

pub struct Tombstones {
    path: PathBuf,
    slots: HashSet<u64>,
}

impl Tombstones {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let slots = if path.exists() {
            let data = std::fs::read(&path)?;
            let file: TombstoneFile = serde_json::from_slice(&data)?;
            file.deleted_slots.into_iter().collect()
        } else {
            HashSet::new()
        };
        Ok(Tombstones { path, slots })
    }

    pub fn contains(&self, slot: u64) -> bool {
        self.slots.contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &u64> {
        self.slots.iter()
    }

    /// Mark `slot` deleted and persist. Idempotent: marking an
    /// already-tombstoned slot again is a no-op.
    pub fn insert(&mut self, slot: u64) -> Result<()> {
        if self.slots.insert(slot) {
            self.save()?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.slots.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        let file = TombstoneFile {
            deleted_slots: self.slots.iter().copied().collect(),
        };
        let tmp_path = self.path.with_extension("tomb.json.tmp");
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(&serde_json::to_vec(&file)?)?;
        tmp.sync_all()?;
        drop(tmp);
        std::fs::rename(&tmp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let t = Tombstones::load(dir.path().join("x.tomb.json")).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn test_insert_persists_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.tomb.json");
        let mut t = Tombstones::load(&path).unwrap();
        t.insert(3).unwrap();
        t.insert(7).unwrap();

        let reloaded = Tombstones::load(&path).unwrap();
        assert!(reloaded.contains(3));
        assert!(reloaded.contains(7));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_insert_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut t = Tombstones::load(dir.path().join("x.tomb.json")).unwrap();
        t.insert(1).unwrap();
        t.insert(1).unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_clear_empties_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.tomb.json");
        let mut t = Tombstones::load(&path).unwrap();
        t.insert(1).unwrap();
        t.clear().unwrap();
        assert!(t.is_empty());

        let reloaded = Tombstones::load(&path).unwrap();
        assert!(reloaded.is_empty());
    }
}
