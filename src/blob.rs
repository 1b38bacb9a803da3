//! File storage collaborator. The workflow only ever holds [`FileRef`]s;
//! bytes live behind this trait.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{Result, WorkflowError};
use crate::types::FileRef;
use crate::utils;

pub const BLOBS_TREE: &str = "blobs";

pub trait BlobStore: Send + Sync {
    fn upload(&self, bytes: &[u8], file_name: &str) -> Result<FileRef>;

    /// Stored bytes, or `NotFound`.
    fn fetch(&self, id: &str) -> Result<Vec<u8>>;

    /// Returns whether anything was deleted.
    fn delete(&self, id: &str) -> Result<bool>;
}

fn new_file_ref(file_name: &str) -> Result<FileRef> {
    let file = FileRef::new(utils::new_uuid_to_bech32("file_")?, file_name.trim());
    file.validate()?;
    Ok(file)
}

fn missing(id: &str) -> WorkflowError {
    WorkflowError::NotFound(format!("file {id}"))
}

#[derive(Clone)]
pub struct SledBlobStore {
    blobs: sled::Tree,
}

impl SledBlobStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            blobs: db.open_tree(BLOBS_TREE)?,
        })
    }
}

impl BlobStore for SledBlobStore {
    fn upload(&self, bytes: &[u8], file_name: &str) -> Result<FileRef> {
        let file = new_file_ref(file_name)?;
        self.blobs.insert(file.id.as_bytes(), bytes)?;
        tracing::debug!(file_id = %file.id, size = bytes.len(), "Stored blob");
        Ok(file)
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(id.as_bytes())?
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| missing(id))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.blobs.remove(id.as_bytes())?.is_some())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, bytes: &[u8], file_name: &str) -> Result<FileRef> {
        let file = new_file_ref(file_name)?;
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file.id.clone(), bytes.to_vec());
        Ok(file)
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| missing(id))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self
            .blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn BlobStore) {
        let file = store.upload(b"%PDF-1.7", "A.pdf").unwrap();
        assert_eq!(file.name, "A.pdf");
        assert!(file.id.starts_with("file_"));

        assert_eq!(store.fetch(&file.id).unwrap(), b"%PDF-1.7");
        assert!(store.delete(&file.id).unwrap());
        assert!(!store.delete(&file.id).unwrap());
        assert!(store.fetch(&file.id).unwrap_err().is_not_found());
    }

    #[test]
    fn memory_store_contract() {
        exercise(&MemoryBlobStore::new());
    }

    #[test]
    fn sled_store_contract() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        exercise(&SledBlobStore::new(&db).unwrap());
    }

    #[test]
    fn upload_requires_a_name() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.upload(b"data", "  "),
            Err(WorkflowError::InvalidInput(_))
        ));
        assert!(store.is_empty());
    }
}
