//! Storage provider abstraction.
//!
//! Everything durable goes through [`StorageProvider`]: a flat byte-level
//! interface over string paths that maps onto a local filesystem or an
//! object store without changing callers. Directory-level transfer is built
//! from the byte primitives as provided methods. The
//! [`EncryptedStorage`](encrypted::EncryptedStorage) wrapper layers
//! transparent encryption over any provider.

pub mod encrypted;
pub mod local;
pub mod memory;
pub mod retry;

pub use encrypted::EncryptedStorage;
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
pub use retry::{with_retry, RetryPolicy};

use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The path does not exist. A normal branch for cold starts, not a
    /// failure.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient infrastructure failure (timeout, connection reset, rate
    /// limit). The only retryable class.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// The path escapes the provider's base or is otherwise malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Non-transient I/O failure.
    #[error("storage i/o error: {0}")]
    Io(String),

    /// Encryption or decryption failed (wrong key, tampered payload).
    #[error("storage crypto error: {0}")]
    Crypto(String),
}

impl StorageError {
    /// Whether a bounded retry may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

/// Byte-level durable storage over string paths.
///
/// Paths use `/` separators regardless of backend. Implementations must be
/// thread-safe; one provider instance is shared across all tenants.
pub trait StorageProvider: Send + Sync {
    /// Whether a file exists at `path`.
    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Writes `data` to `path`, creating intermediate prefixes as needed
    /// and overwriting any existing file.
    fn upload_bytes(&self, data: &[u8], path: &str) -> Result<(), StorageError>;

    /// Reads the file at `path`. Fails with [`StorageError::NotFound`] if
    /// absent.
    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Lists every file path under `prefix`, sorted. An absent prefix
    /// yields an empty list.
    fn list_files(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Deletes the file at `path`. Deleting an absent file is a no-op.
    fn delete_file(&self, path: &str) -> Result<(), StorageError>;

    /// Size in bytes of the file at `path`.
    fn get_file_size(&self, path: &str) -> Result<u64, StorageError>;

    /// Idempotently ensures `prefix` exists. A no-op for backends where
    /// prefixes are implicit.
    fn create_prefix(&self, _prefix: &str) -> Result<(), StorageError> {
        Ok(())
    }

    /// Copies every file under the local directory `local_dir` to
    /// `remote_prefix`, preserving relative paths.
    fn upload_directory(&self, local_dir: &std::path::Path, remote_prefix: &str) -> Result<usize, StorageError> {
        let mut uploaded = 0;
        let mut stack = vec![local_dir.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let entries = std::fs::read_dir(&dir)
                .map_err(|e| StorageError::Io(format!("read_dir {}: {e}", dir.display())))?;
            for entry in entries {
                let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let relative = path
                    .strip_prefix(local_dir)
                    .map_err(|e| StorageError::InvalidPath(e.to_string()))?;
                let remote = join_prefix(remote_prefix, &relative.to_string_lossy());
                let data = std::fs::read(&path)
                    .map_err(|e| StorageError::Io(format!("read {}: {e}", path.display())))?;
                self.upload_bytes(&data, &remote)?;
                uploaded += 1;
            }
        }
        Ok(uploaded)
    }

    /// Copies every file under `remote_prefix` into the local directory
    /// `local_dir`, preserving relative paths.
    fn download_directory(&self, remote_prefix: &str, local_dir: &std::path::Path) -> Result<usize, StorageError> {
        let mut downloaded = 0;
        for remote in self.list_files(remote_prefix)? {
            let relative = remote
                .strip_prefix(remote_prefix)
                .map(|r| r.trim_start_matches('/'))
                .unwrap_or(remote.as_str());
            let target = local_dir.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Io(format!("mkdir {}: {e}", parent.display())))?;
            }
            let data = self.download_bytes(&remote)?;
            std::fs::write(&target, data)
                .map_err(|e| StorageError::Io(format!("write {}: {e}", target.display())))?;
            downloaded += 1;
        }
        Ok(downloaded)
    }
}

impl<T: StorageProvider + ?Sized> StorageProvider for std::sync::Arc<T> {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        (**self).exists(path)
    }

    fn upload_bytes(&self, data: &[u8], path: &str) -> Result<(), StorageError> {
        (**self).upload_bytes(data, path)
    }

    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        (**self).download_bytes(path)
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).list_files(prefix)
    }

    fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        (**self).delete_file(path)
    }

    fn get_file_size(&self, path: &str) -> Result<u64, StorageError> {
        (**self).get_file_size(path)
    }

    fn create_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        (**self).create_prefix(prefix)
    }
}

/// Joins a prefix and a relative path with a single `/`.
pub(crate) fn join_prefix(prefix: &str, rest: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{prefix}/{rest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StorageError::Transient("timeout".into()).is_transient());
        assert!(!StorageError::NotFound("x".into()).is_transient());
        assert!(!StorageError::Io("disk".into()).is_transient());
    }

    #[test]
    fn join_prefix_normalizes_slashes() {
        assert_eq!(join_prefix("a/b/", "/c.txt"), "a/b/c.txt");
        assert_eq!(join_prefix("", "c.txt"), "c.txt");
        assert_eq!(join_prefix("a", "b/c"), "a/b/c");
    }
}
