//! Polled file locks.
//!
//! Every mutating command holds the instance-wide lock for its whole
//! duration, so a hostname migration never interleaves with a document
//! edit or a certificate switch started by another process (e.g. a renewal
//! hook). `ConfigStore::update` takes the same kind of lock on the
//! document's `.lock` sibling.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("cannot open lock file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("another operation holds {path:?}; gave up after {secs}s")]
    Busy { path: PathBuf, secs: u64 },
}

/// Exclusive lock held until dropped.
#[derive(Debug)]
pub struct OperationLock {
    file: File,
    path: PathBuf,
}

impl OperationLock {
    /// Acquire the lock, polling until `timeout` elapses.
    pub async fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        let mut waiting = false;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if Instant::now() < deadline => {
                    if !waiting {
                        tracing::info!(path = ?path, "Waiting for another operation to finish");
                        waiting = true;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(_) => {
                    return Err(LockError::Busy {
                        path: path.to_path_buf(),
                        secs: timeout.as_secs(),
                    })
                }
            }
        }

        tracing::debug!(path = ?path, "Operation lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = ?self.path, error = %e, "Failed to release operation lock");
        }
    }
}
