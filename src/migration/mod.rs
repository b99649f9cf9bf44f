//! Two-phase node identity migration (hostname change).
//!
//! # Data Flow
//! ```text
//! prepare(old, new)                            Stable → BackedUp → Migrated
//!     → tool present?            no → ToolMissing (nothing done)
//!     → export as service@old    → backup_path
//!     → re-tag old → new         → migrated_path
//!                                fails → MigrationFailed, backup kept
//!
//! apply(old, new)                              BackedUp/Migrated → Restored
//!     → stop service
//!     → kill leftover processes of the runtime user
//!     → quarantine spool entries → <spool>/<archive>/<service@old>-<secs>/
//!     → start service (cold, empty store)
//!     → migrated snapshot present? import, delete both snapshots
//!                                  absent → SnapshotMissing warning
//! ```
//!
//! # Design Decisions
//! - Quarantine moves files, it never deletes them
//! - A stop failure aborts before anything is moved; once files are moved
//!   the sequence always tries to start the service again
//! - Snapshots are only deleted after a successful import

pub mod identity;
pub mod quarantine;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

use crate::config::MigrationConfig;
use crate::domains::{self, DomainError};
use crate::lifecycle::{ProcessError, ServiceControl};

pub use identity::{EjabberdCtl, NodeIdentity, NodeIdentityStore, SnapshotHandle};
pub use quarantine::Quarantine;

/// Position of an instance in the migration protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MigrationState {
    Stable,
    BackedUp,
    Migrated,
    MigrationFailed,
    Restored,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("management tool not available")]
    ToolMissing,

    #[error(transparent)]
    InvalidHost(#[from] DomainError),

    #[error("failed to export the store: {0}")]
    Export(#[source] ProcessError),

    #[error("failed to re-tag snapshot {backup:?}, original backup kept: {source}")]
    RenameFailed {
        backup: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("failed to stop the service, nothing was changed: {0}")]
    Stop(#[source] ProcessError),

    #[error("failed to quarantine {path:?}: {source}")]
    Quarantine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start the service: {0}")]
    Start(#[source] ProcessError),

    #[error("failed to import {path:?}, snapshot kept: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("filesystem error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    /// State the instance is left in.
    pub fn state(&self) -> MigrationState {
        match self {
            MigrationError::RenameFailed { .. } | MigrationError::Import { .. } => {
                MigrationState::MigrationFailed
            }
            _ => MigrationState::Stable,
        }
    }
}

/// Result of the first phase.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareReport {
    pub old: NodeIdentity,
    pub new: NodeIdentity,
    pub backup: PathBuf,
    pub migrated: PathBuf,
    pub state: MigrationState,
}

/// Result of the second phase.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub old: NodeIdentity,
    pub new: NodeIdentity,
    pub quarantine_dir: PathBuf,
    pub quarantined: usize,
    /// No migrated snapshot existed; the service runs with an empty store.
    pub snapshot_missing: bool,
    pub state: MigrationState,
}

/// Snapshot files on disk and the state they imply.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub state: MigrationState,
    pub backup: PathBuf,
    pub backup_present: bool,
    pub migrated: PathBuf,
    pub migrated_present: bool,
}

/// Orchestrates the hostname change of one service instance.
pub struct NodeMigrator {
    service_name: String,
    spool_dir: PathBuf,
    config: MigrationConfig,
    service: Arc<dyn ServiceControl>,
    identities: Arc<dyn NodeIdentityStore>,
}

impl NodeMigrator {
    pub fn new(
        service_name: impl Into<String>,
        spool_dir: impl Into<PathBuf>,
        config: MigrationConfig,
        service: Arc<dyn ServiceControl>,
        identities: Arc<dyn NodeIdentityStore>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            spool_dir: spool_dir.into(),
            config,
            service,
            identities,
        }
    }

    pub fn identity(&self, host: &str) -> Result<NodeIdentity, MigrationError> {
        domains::validate_domain(host)?;
        Ok(NodeIdentity::new(self.service_name.as_str(), host))
    }

    pub fn status(&self) -> MigrationStatus {
        let backup_present = self.config.backup_path.is_file();
        let migrated_present = self.config.migrated_path.is_file();
        let state = match (backup_present, migrated_present) {
            (_, true) => MigrationState::Migrated,
            (true, false) => MigrationState::BackedUp,
            (false, false) => MigrationState::Stable,
        };
        MigrationStatus {
            state,
            backup: self.config.backup_path.clone(),
            backup_present,
            migrated: self.config.migrated_path.clone(),
            migrated_present,
        }
    }

    /// Phase 1: export under the old identity and re-tag to the new one.
    pub async fn prepare(&self, old: &str, new: &str) -> Result<PrepareReport, MigrationError> {
        let (old, new) = (self.identity(old)?, self.identity(new)?);
        if !self.identities.is_available() {
            return Err(MigrationError::ToolMissing);
        }

        let backup_path = &self.config.backup_path;
        let migrated_path = &self.config.migrated_path;
        ensure_parent(backup_path)?;
        ensure_parent(migrated_path)?;
        remove_if_present(migrated_path)?;

        let backup = self
            .identities
            .export(&old, backup_path)
            .await
            .map_err(MigrationError::Export)?;
        tracing::info!(identity = %old, path = ?backup.path, "Store exported");

        let migrated = self
            .identities
            .rename_tag(&old, &new, &backup, migrated_path)
            .await
            .map_err(|source| {
                tracing::error!(
                    old = %old,
                    new = %new,
                    backup = ?backup.path,
                    error = %source,
                    "Snapshot re-tag failed; original backup kept for retry"
                );
                MigrationError::RenameFailed {
                    backup: backup.path.clone(),
                    source,
                }
            })?;
        tracing::info!(identity = %new, path = ?migrated.path, "Snapshot re-tagged");

        Ok(PrepareReport {
            old,
            new,
            backup: backup.path,
            migrated: migrated.path,
            state: MigrationState::Migrated,
        })
    }

    /// Phase 2: restart cold under the new identity and reload the data.
    pub async fn apply(&self, old: &str, new: &str) -> Result<ApplyReport, MigrationError> {
        let (old, new) = (self.identity(old)?, self.identity(new)?);
        if !self.identities.is_available() {
            return Err(MigrationError::ToolMissing);
        }

        self.service.stop().await.map_err(MigrationError::Stop)?;
        tracing::info!(service = self.service.name(), "Service stopped");

        if let Err(e) = self.service.terminate_user_processes().await {
            tracing::warn!(error = %e, "Could not terminate leftover processes");
        }

        let label = format!("{old}-{}", unix_secs());
        let keep = [self.config.backup_path.as_path(), self.config.migrated_path.as_path()];
        let quarantined = quarantine::quarantine(&self.spool_dir, &self.config.archive_dir, &label, &keep);

        let started = self.service.start().await;
        let quarantined = quarantined.map_err(|source| MigrationError::Quarantine {
            path: self.spool_dir.clone(),
            source,
        })?;
        started.map_err(MigrationError::Start)?;
        tracing::info!(
            service = self.service.name(),
            quarantined = quarantined.moved,
            archive = ?quarantined.dir,
            "Service started with an empty store"
        );

        let migrated_path = &self.config.migrated_path;
        let snapshot_missing = !migrated_path.is_file();
        if snapshot_missing {
            tracing::warn!(
                path = ?migrated_path,
                "No migrated snapshot found; the service runs with an empty store"
            );
        } else {
            let snapshot = SnapshotHandle {
                path: migrated_path.clone(),
                identity: new.clone(),
            };
            self.identities
                .import(&snapshot)
                .await
                .map_err(|source| MigrationError::Import {
                    path: migrated_path.clone(),
                    source,
                })?;
            tracing::info!(identity = %new, "Snapshot restored");
            remove_if_present(migrated_path)?;
            remove_if_present(&self.config.backup_path)?;
        }

        Ok(ApplyReport {
            old,
            new,
            quarantine_dir: quarantined.dir,
            quarantined: quarantined.moved,
            snapshot_missing,
            state: MigrationState::Restored,
        })
    }
}

fn ensure_parent(path: &Path) -> Result<(), MigrationError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|source| MigrationError::Io {
            path: parent.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}

fn remove_if_present(path: &Path) -> Result<(), MigrationError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(MigrationError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
