//! Node identity and the snapshot capability of the persistent store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::lifecycle::process::{self, ProcessError};

/// `<service>@<host>`, the tag the store records data ownership under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeIdentity {
    pub service: String,
    pub host: String,
}

impl NodeIdentity {
    pub fn new(service: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.service, self.host)
    }
}

/// An exported snapshot on disk and the identity its data is tagged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHandle {
    pub path: PathBuf,
    pub identity: NodeIdentity,
}

/// Export, re-tag and import of the service's persistent data.
#[async_trait]
pub trait NodeIdentityStore: Send + Sync {
    /// Whether the management tool is installed.
    fn is_available(&self) -> bool;

    async fn export(&self, identity: &NodeIdentity, path: &Path) -> Result<SnapshotHandle, ProcessError>;

    /// Write a copy of `snapshot` re-tagged from `old` to `new` at `output`.
    async fn rename_tag(
        &self,
        old: &NodeIdentity,
        new: &NodeIdentity,
        snapshot: &SnapshotHandle,
        output: &Path,
    ) -> Result<SnapshotHandle, ProcessError>;

    /// Load `snapshot` into the running service.
    async fn import(&self, snapshot: &SnapshotHandle) -> Result<(), ProcessError>;
}

/// `ejabberdctl`-backed snapshots.
#[derive(Debug, Clone)]
pub struct EjabberdCtl {
    path: PathBuf,
    timeout: Duration,
}

impl EjabberdCtl {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    async fn ctl(&self, args: &[&str]) -> Result<(), ProcessError> {
        let program = self.path.to_string_lossy();
        process::run(&program, args, self.timeout).await.map(|_| ())
    }
}

#[async_trait]
impl NodeIdentityStore for EjabberdCtl {
    fn is_available(&self) -> bool {
        self.path.is_file()
    }

    async fn export(&self, identity: &NodeIdentity, path: &Path) -> Result<SnapshotHandle, ProcessError> {
        let target = path.to_string_lossy();
        self.ctl(&["backup", target.as_ref()]).await?;
        Ok(SnapshotHandle {
            path: path.to_path_buf(),
            identity: identity.clone(),
        })
    }

    async fn rename_tag(
        &self,
        old: &NodeIdentity,
        new: &NodeIdentity,
        snapshot: &SnapshotHandle,
        output: &Path,
    ) -> Result<SnapshotHandle, ProcessError> {
        let (old_tag, new_tag) = (old.to_string(), new.to_string());
        let input = snapshot.path.to_string_lossy();
        let target = output.to_string_lossy();
        self.ctl(&[
            "mnesia_change_nodename",
            old_tag.as_str(),
            new_tag.as_str(),
            input.as_ref(),
            target.as_ref(),
        ])
        .await?;
        Ok(SnapshotHandle {
            path: output.to_path_buf(),
            identity: new.clone(),
        })
    }

    async fn import(&self, snapshot: &SnapshotHandle) -> Result<(), ProcessError> {
        // Blocks until the node accepts commands.
        self.ctl(&["started"]).await?;
        let source = snapshot.path.to_string_lossy();
        self.ctl(&["restore", source.as_ref()]).await
    }
}
