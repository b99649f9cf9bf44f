//! Collaborators shared by every command.

use std::sync::Arc;
use std::time::Duration;

use crate::certificate::CertificateManager;
use crate::config::AdminConfig;
use crate::document::ConfigStore;
use crate::domains::DomainRegistrar;
use crate::lifecycle::{LockError, OperationLock, ServiceControl, SystemdUnit, WebFrontend};
use crate::migration::{EjabberdCtl, NodeIdentityStore, NodeMigrator};
use crate::modules::ModuleToggle;

/// Tool configuration plus the external capabilities commands act through.
pub struct Context {
    pub config: AdminConfig,
    pub service: Arc<dyn ServiceControl>,
    pub frontend: WebFrontend,
    pub identities: Arc<dyn NodeIdentityStore>,
}

impl Context {
    /// Wire the real systemd units and management tool.
    pub fn from_config(config: AdminConfig) -> Self {
        let timeout = Duration::from_secs(config.timeouts.service_secs);
        let service = Arc::new(
            SystemdUnit::new(config.service.unit.as_str(), timeout)
                .with_user(config.service.user.clone()),
        );
        let web_server = Arc::new(SystemdUnit::new(config.frontend.unit.as_str(), timeout));
        let identities = Arc::new(EjabberdCtl::new(
            config.service.ctl_path.clone(),
            Duration::from_secs(config.timeouts.snapshot_secs),
        ));
        Self::new(config, service, web_server, identities)
    }

    pub fn new(
        config: AdminConfig,
        service: Arc<dyn ServiceControl>,
        web_server: Arc<dyn ServiceControl>,
        identities: Arc<dyn NodeIdentityStore>,
    ) -> Self {
        let frontend = WebFrontend::new(&config.frontend, web_server);
        Self {
            config,
            service,
            frontend,
            identities,
        }
    }

    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(self.config.service.document_path.clone())
            .with_lock_timeout(Duration::from_secs(self.config.timeouts.lock_secs))
    }

    pub fn certificates(&self) -> CertificateManager {
        CertificateManager::new(
            self.store(),
            self.config.certificates.clone(),
            Arc::clone(&self.service),
        )
        .with_primary_domain(self.config.service.primary_domain.clone())
        .with_owner(self.config.service.ownership())
        .with_timeout(Duration::from_secs(self.config.timeouts.service_secs))
    }

    pub fn modules(&self) -> ModuleToggle {
        ModuleToggle::new(self.store(), Arc::clone(&self.service))
            .with_defaults(self.config.modules.clone())
    }

    pub fn registrar(&self) -> DomainRegistrar {
        DomainRegistrar::new(self.store())
    }

    pub fn migrator(&self) -> NodeMigrator {
        NodeMigrator::new(
            self.config.service.name.as_str(),
            self.config.service.spool_dir.clone(),
            self.config.migration.clone(),
            Arc::clone(&self.service),
            Arc::clone(&self.identities),
        )
    }

    /// Exclusive access to the instance for one mutating command.
    pub async fn lock(&self) -> Result<OperationLock, LockError> {
        OperationLock::acquire(
            &self.config.service.lock_path,
            Duration::from_secs(self.config.timeouts.lock_secs),
        )
        .await
    }
}
