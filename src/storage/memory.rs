//! In-memory storage provider for tests and ephemeral runs.

use super::{StorageError, StorageProvider};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A `BTreeMap`-backed provider. Keys sort naturally, so `list_files` is
/// ordered for free. Everything vanishes on drop.
#[derive(Default)]
pub struct InMemoryStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        match self.files.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StorageProvider for InMemoryStorage {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.lock().contains_key(path))
    }

    fn upload_bytes(&self, data: &[u8], path: &str) -> Result<(), StorageError> {
        self.lock().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = prefix.trim_end_matches('/');
        let files = self.lock();
        Ok(files
            .keys()
            .filter(|k| {
                k.as_str() == prefix || k.starts_with(&format!("{prefix}/")) || prefix.is_empty()
            })
            .cloned()
            .collect())
    }

    fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        self.lock().remove(path);
        Ok(())
    }

    fn get_file_size(&self, path: &str) -> Result<u64, StorageError> {
        self.lock()
            .get(path)
            .map(|d| d.len() as u64)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let s = InMemoryStorage::new();
        s.upload_bytes(b"data", "t/docs.jsonl").unwrap();
        assert!(s.exists("t/docs.jsonl").unwrap());
        assert_eq!(s.download_bytes("t/docs.jsonl").unwrap(), b"data");
        assert_eq!(s.get_file_size("t/docs.jsonl").unwrap(), 4);
    }

    #[test]
    fn missing_file_is_not_found() {
        let s = InMemoryStorage::new();
        assert!(matches!(
            s.download_bytes("nope"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            s.get_file_size("nope"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn list_files_matches_prefix_boundaries() {
        let s = InMemoryStorage::new();
        s.upload_bytes(b"1", "tenant-a/docs.jsonl").unwrap();
        s.upload_bytes(b"2", "tenant-ab/docs.jsonl").unwrap();

        let files = s.list_files("tenant-a").unwrap();
        assert_eq!(files, vec!["tenant-a/docs.jsonl"]);
    }

    #[test]
    fn delete_is_idempotent() {
        let s = InMemoryStorage::new();
        s.upload_bytes(b"x", "f").unwrap();
        s.delete_file("f").unwrap();
        s.delete_file("f").unwrap();
        assert!(!s.exists("f").unwrap());
    }
}
