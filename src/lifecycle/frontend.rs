//! Web front-end vhost toggle.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::FrontendConfig;
use crate::lifecycle::service::{restart_if_running, RestartOutcome, ServiceControl};

/// The web server vhost serving the service's HTTP endpoints.
pub struct WebFrontend {
    site_available: PathBuf,
    site_enabled: PathBuf,
    server: Arc<dyn ServiceControl>,
}

impl WebFrontend {
    pub fn new(config: &FrontendConfig, server: Arc<dyn ServiceControl>) -> Self {
        Self {
            site_available: config.site_available.clone(),
            site_enabled: config.site_enabled.clone(),
            server,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.site_enabled.symlink_metadata().is_ok()
    }

    /// Link or unlink the vhost, then restart the web server if it runs.
    pub async fn set_enabled(&self, enabled: bool) -> std::io::Result<RestartOutcome> {
        let changed = if enabled {
            self.link()?
        } else {
            self.unlink()?
        };

        if !changed {
            tracing::debug!(site = ?self.site_enabled, enabled, "Vhost already in requested state");
            return Ok(RestartOutcome::NotRunning);
        }
        tracing::info!(site = ?self.site_enabled, enabled, "Vhost toggled");
        Ok(restart_if_running(self.server.as_ref()).await)
    }

    fn link(&self) -> std::io::Result<bool> {
        if self.is_enabled() {
            return Ok(false);
        }
        if let Some(parent) = self.site_enabled.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::os::unix::fs::symlink(&self.site_available, &self.site_enabled)?;
        Ok(true)
    }

    fn unlink(&self) -> std::io::Result<bool> {
        match std::fs::remove_file(&self.site_enabled) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
