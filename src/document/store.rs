//! Persistence of the service configuration document.
//!
//! # Responsibilities
//! - Read the document and derive its typed view
//! - Write it back atomically (temp file in the same directory + rename)
//! - Serialize load → mutate → store across processes with an advisory lock
//!
//! # Design Decisions
//! - The lock lives in a sibling `<document>.lock` file; the document's own
//!   inode is replaced by every write and cannot carry a lock
//! - The lock is polled with a bounded wait, never a blocking `flock`
//! - The written file keeps the mode and owner of the file it replaces
//! - A document that did not change is not rewritten

use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::document::{ConfigDocument, DocumentError};
use crate::lifecycle::{LockError, OperationLock};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration {path:?} is unreadable: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration {path:?} is malformed: {source}")]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("failed to write configuration {path:?}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock configuration: {0}")]
    Lock(#[from] LockError),
}

/// File-backed store for the service configuration document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long `update` waits for another writer of the same document.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Read and parse the document.
    pub fn load(&self) -> Result<ConfigDocument, StoreError> {
        let source = fs::read_to_string(&self.path).map_err(|source| {
            StoreError::ConfigUnreadable {
                path: self.path.clone(),
                source,
            }
        })?;
        ConfigDocument::parse(&source).map_err(|source| StoreError::ConfigMalformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the document atomically.
    pub fn store(&self, doc: &ConfigDocument) -> Result<(), StoreError> {
        self.write_atomic(doc.render().as_bytes())
            .map_err(|source| StoreError::ConfigWriteFailed {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!(path = ?self.path, "Configuration written");
        Ok(())
    }

    /// Load, mutate and store under the exclusive lock.
    ///
    /// The document is stored only when `mutate` succeeds and changed the
    /// text; an error from `mutate` leaves the file untouched.
    pub async fn update<T, E, F>(&self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<T, E>,
        E: From<StoreError>,
    {
        let lock = OperationLock::acquire(&lock_path(&self.path), self.lock_timeout)
            .await
            .map_err(StoreError::from)?;
        let mut doc = self.load()?;
        let original = doc.render();

        let out = mutate(&mut doc)?;
        if doc.render() != original {
            self.store(&doc)?;
        } else {
            tracing::debug!(path = ?self.path, "Configuration unchanged, not rewritten");
        }

        drop(lock);
        Ok(out)
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let previous = fs::metadata(&self.path).ok();

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        if let Some(meta) = &previous {
            tmp.as_file().set_permissions(meta.permissions())?;
            if let Err(e) = std::os::unix::fs::fchown(tmp.as_file(), Some(meta.uid()), Some(meta.gid())) {
                tracing::debug!(error = %e, "Could not carry over document owner");
            }
        }

        tmp.persist(&self.path).map_err(|e| e.error)?;
        File::open(dir)?.sync_all()?;
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}
