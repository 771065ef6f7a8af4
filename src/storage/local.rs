//! Local filesystem storage provider.

use super::{StorageError, StorageProvider};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Stores files under a base directory, mapping storage paths directly to
/// relative filesystem paths. Paths are validated component-wise so no
/// request can escape the base directory.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Creates the provider, creating the base directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)
            .map_err(|e| StorageError::Io(format!("create base dir: {e}")))?;
        Ok(Self { base_path })
    }

    /// Resolves a storage path against the base directory.
    ///
    /// Rejects absolute paths and any `..`/`.` components before touching
    /// the filesystem, which also covers paths that do not exist yet.
    fn full_path(&self, remote_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(remote_path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(StorageError::InvalidPath(remote_path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StorageError::InvalidPath(remote_path.to_string())),
            }
        }
        Ok(self.base_path.join(relative))
    }

    fn map_io(path: &str, e: std::io::Error) -> StorageError {
        if e.kind() == ErrorKind::NotFound {
            StorageError::NotFound(path.to_string())
        } else {
            StorageError::Io(format!("{path}: {e}"))
        }
    }
}

impl StorageProvider for LocalStorage {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.full_path(path)?;
        Ok(full.is_file())
    }

    fn upload_bytes(&self, data: &[u8], path: &str) -> Result<(), StorageError> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Io(format!("mkdir {}: {e}", parent.display())))?;
        }
        std::fs::write(&full, data).map_err(|e| Self::map_io(path, e))
    }

    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.full_path(path)?;
        std::fs::read(&full).map_err(|e| Self::map_io(path, e))
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let full = self.full_path(prefix)?;
        if !full.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut stack = vec![full];
        while let Some(dir) = stack.pop() {
            if dir.is_file() {
                if let Ok(relative) = dir.strip_prefix(&self.base_path) {
                    files.push(relative.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"));
                }
                continue;
            }
            let entries =
                std::fs::read_dir(&dir).map_err(|e| Self::map_io(prefix, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
                stack.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        let full = self.full_path(path)?;
        match std::fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("{path}: {e}"))),
        }
    }

    fn get_file_size(&self, path: &str) -> Result<u64, StorageError> {
        let full = self.full_path(path)?;
        let meta = std::fs::metadata(&full).map_err(|e| Self::map_io(path, e))?;
        Ok(meta.len())
    }

    fn create_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let full = self.full_path(prefix)?;
        std::fs::create_dir_all(&full)
            .map_err(|e| StorageError::Io(format!("mkdir {}: {e}", full.display())))
    }
}
