//! Service lifecycle capability.
//!
//! # Responsibilities
//! - Query whether the service is running
//! - Start, stop, restart, enable/disable at boot
//! - Kill processes left behind by the service's runtime user
//!
//! # Design Decisions
//! - Components receive an `Arc<dyn ServiceControl>` instead of shelling out
//!   ad hoc, so tests substitute a fake
//! - `restart_if_running` never starts a stopped service

use std::time::Duration;

use async_trait::async_trait;

use crate::lifecycle::process::{self, ProcessError};

const SYSTEMCTL: &str = "systemctl";
const PKILL: &str = "pkill";

/// Process lifecycle of a long-running service.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    async fn is_running(&self) -> bool;

    async fn start(&self) -> Result<(), ProcessError>;

    async fn stop(&self) -> Result<(), ProcessError>;

    async fn restart(&self) -> Result<(), ProcessError>;

    /// Enable or disable start at boot.
    async fn set_enabled(&self, enabled: bool) -> Result<(), ProcessError>;

    /// Forcibly terminate processes still owned by the runtime user.
    async fn terminate_user_processes(&self) -> Result<(), ProcessError>;
}

/// What happened to the service after a configuration change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The service was stopped and stays stopped.
    NotRunning,
    Restarted,
    /// The change is persisted but the restart failed.
    Failed(String),
}

/// Restart `service` only if it is currently running.
pub async fn restart_if_running(service: &dyn ServiceControl) -> RestartOutcome {
    if !service.is_running().await {
        tracing::info!(service = service.name(), "Service not running, no restart needed");
        return RestartOutcome::NotRunning;
    }

    match service.restart().await {
        Ok(()) => {
            tracing::info!(service = service.name(), "Service restarted");
            RestartOutcome::Restarted
        }
        Err(e) => {
            tracing::error!(service = service.name(), error = %e, "Service restart failed");
            RestartOutcome::Failed(e.to_string())
        }
    }
}

/// A systemd unit.
#[derive(Debug, Clone)]
pub struct SystemdUnit {
    unit: String,
    user: Option<String>,
    timeout: Duration,
}

impl SystemdUnit {
    pub fn new(unit: impl Into<String>, timeout: Duration) -> Self {
        Self {
            unit: unit.into(),
            user: None,
            timeout,
        }
    }

    /// Runtime user whose processes `terminate_user_processes` kills.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    async fn systemctl(&self, args: &[&str]) -> Result<(), ProcessError> {
        process::run(SYSTEMCTL, args, self.timeout).await.map(|_| ())
    }
}

#[async_trait]
impl ServiceControl for SystemdUnit {
    fn name(&self) -> &str {
        &self.unit
    }

    async fn is_running(&self) -> bool {
        match self.systemctl(&["is-active", "--quiet", self.unit.as_str()]).await {
            Ok(()) => true,
            Err(ProcessError::Failed { .. }) => false,
            Err(e) => {
                tracing::warn!(unit = %self.unit, error = %e, "Could not query unit state, assuming stopped");
                false
            }
        }
    }

    async fn start(&self) -> Result<(), ProcessError> {
        self.systemctl(&["start", self.unit.as_str()]).await
    }

    async fn stop(&self) -> Result<(), ProcessError> {
        self.systemctl(&["stop", self.unit.as_str()]).await
    }

    async fn restart(&self) -> Result<(), ProcessError> {
        self.systemctl(&["restart", self.unit.as_str()]).await
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), ProcessError> {
        let verb = if enabled { "enable" } else { "disable" };
        self.systemctl(&[verb, self.unit.as_str()]).await
    }

    async fn terminate_user_processes(&self) -> Result<(), ProcessError> {
        let Some(user) = &self.user else {
            return Ok(());
        };
        // pkill exits 1 when nothing matched.
        process::run_accepting(PKILL, ["-KILL", "-u", user.as_str()], self.timeout, &[0, 1])
            .await
            .map(|_| ())
    }
}
