//! Certificate switching subsystem.
//!
//! # Data Flow
//! ```text
//! add(domain):
//!     validate domain (configured, current) → source material present & parsable
//!     → managed.rs assemble <managed_dir>/<domain>/<file_name> (0600, chown)
//!     → document: every listener `certfile` + `s2s_certfile` → managed file
//!     → restart if running
//!
//! drop(domain?):
//!     resolve domain (explicit or primary)
//!     → document: only values equal to THIS domain's managed file → original
//!     → remove <managed_dir>/<domain>
//!     → restart if running
//! ```
//!
//! # Design Decisions
//! - `add` is restricted to the instance's current domain
//! - `drop` compares for equality, so cleaning up one domain never resets a
//!   listener serving another domain's certificate
//! - `add` never gives a listener a `certfile` it did not declare
//! - The document is persisted before the managed folder is removed, so it
//!   never points at a file that is already gone

pub mod managed;
pub mod pem;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{CertificateConfig, Ownership};
use crate::document::{ConfigDocument, ConfigStore, DocumentError, StoreError};
use crate::domains::{self, DomainError};
use crate::lifecycle::{restart_if_running, ProcessError, RestartOutcome, ServiceControl};

pub use managed::{CertificateSource, ManagedCertificate};

/// Errors raised by certificate operations.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("domain {0} is not configured in hosts")]
    DomainNotConfigured(String),

    #[error("certificates can only be added for the current domain {current}, not {requested}")]
    ForeignDomain { requested: String, current: String },

    #[error("no certificate material for {domain} in {dir:?}")]
    SourceMissing { domain: String, dir: PathBuf },

    #[error("invalid certificate material in {path:?}: {reason}")]
    InvalidMaterial { path: PathBuf, reason: String },

    #[error("no domain given and no primary domain configured")]
    NoPrimaryDomain,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to hand certificate to the service user: {0}")]
    Ownership(#[from] ProcessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Summary of a certificate switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateReport {
    pub domain: String,
    /// Certificate the touched fields now point at.
    pub cert_file: PathBuf,
    pub listeners_updated: usize,
    pub s2s_updated: bool,
    /// `drop` only: the managed folder existed and was removed.
    pub folder_removed: bool,
    pub restart: RestartOutcome,
}

/// Switches the service between its shipped certificate and managed ones.
pub struct CertificateManager {
    store: ConfigStore,
    config: CertificateConfig,
    primary_domain: Option<String>,
    owner: Option<Ownership>,
    timeout: Duration,
    service: Arc<dyn ServiceControl>,
}

impl CertificateManager {
    pub fn new(store: ConfigStore, config: CertificateConfig, service: Arc<dyn ServiceControl>) -> Self {
        Self {
            store,
            config,
            primary_domain: None,
            owner: None,
            timeout: Duration::from_secs(120),
            service,
        }
    }

    /// Primary domain overriding the first entry of `hosts`.
    pub fn with_primary_domain(mut self, domain: Option<String>) -> Self {
        self.primary_domain = domain;
        self
    }

    /// Owner applied to assembled certificates.
    pub fn with_owner(mut self, owner: Option<Ownership>) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn managed(&self, domain: &str) -> ManagedCertificate {
        ManagedCertificate::for_domain(&self.config, domain)
    }

    fn current_domain(&self, doc: &ConfigDocument) -> Option<String> {
        domains::primary_domain(self.primary_domain.as_deref(), doc)
    }

    /// Install a managed certificate for `domain` (default: the current
    /// domain) and point every certificate-bearing listener and the
    /// server-to-server certificate at it.
    pub async fn add(&self, domain: Option<&str>) -> Result<CertificateReport, CertificateError> {
        let doc = self.store.load()?;
        let current = self.current_domain(&doc);
        let domain = match domain {
            Some(d) => d.to_string(),
            None => current.clone().ok_or(CertificateError::NoPrimaryDomain)?,
        };
        domains::validate_domain(&domain)?;

        if !doc.model().has_host(&domain) {
            return Err(CertificateError::DomainNotConfigured(domain));
        }
        let current = current.ok_or(CertificateError::NoPrimaryDomain)?;
        if domain != current {
            return Err(CertificateError::ForeignDomain {
                requested: domain,
                current,
            });
        }

        let source = CertificateSource::for_domain(&self.config, &domain);
        if !source.is_complete() {
            return Err(CertificateError::SourceMissing {
                domain,
                dir: source.dir,
            });
        }
        let contents = self.read_material(&source)?;

        let managed = self.managed(&domain);
        managed.write(&contents).map_err(|source| CertificateError::Io {
            path: managed.file.clone(),
            source,
        })?;
        if let Some(owner) = &self.owner {
            managed.chown(owner, self.timeout).await?;
        }
        tracing::info!(domain = %domain, file = ?managed.file, "Managed certificate assembled");

        let target = managed.file_str();
        let (listeners_updated, s2s_updated) = self.store.update(|doc| {
            if !doc.model().has_host(&domain) {
                return Err(CertificateError::DomainNotConfigured(domain.clone()));
            }
            let listeners = doc.rewrite_listener_cert_files(|_| Some(target.clone()))?;
            let s2s = doc.set_s2s_cert_file(&target)?;
            Ok((listeners, s2s))
        }).await?;
        tracing::info!(
            domain = %domain,
            listeners_updated,
            s2s_updated,
            "Service now uses the managed certificate"
        );

        let restart = restart_if_running(self.service.as_ref()).await;
        Ok(CertificateReport {
            domain,
            cert_file: managed.file,
            listeners_updated,
            s2s_updated,
            folder_removed: false,
            restart,
        })
    }

    /// Revert every field that points at `domain`'s managed certificate to
    /// the shipped certificate and delete the managed folder.
    pub async fn drop(&self, domain: Option<&str>) -> Result<CertificateReport, CertificateError> {
        let doc = self.store.load()?;
        let domain = match domain {
            Some(d) => {
                domains::validate_domain(d)?;
                if !doc.model().has_host(d) {
                    return Err(CertificateError::DomainNotConfigured(d.to_string()));
                }
                d.to_string()
            }
            None => self
                .current_domain(&doc)
                .ok_or(CertificateError::NoPrimaryDomain)?,
        };
        domains::validate_domain(&domain)?;

        let managed = self.managed(&domain);
        let managed_file = managed.file_str();
        let original = self.config.original.to_string_lossy().into_owned();

        let (listeners_updated, s2s_updated) = self.store.update(|doc| {
            let listeners = doc.rewrite_listener_cert_files(|current| {
                (current == managed_file).then(|| original.clone())
            })?;
            let s2s = if doc.s2s_cert_file() == Some(managed_file.as_str()) {
                doc.set_s2s_cert_file(&original)?
            } else {
                false
            };
            Ok::<_, CertificateError>((listeners, s2s))
        }).await?;

        let folder_removed = managed.remove().map_err(|source| CertificateError::Io {
            path: managed.folder.clone(),
            source,
        })?;
        tracing::info!(
            domain = %domain,
            listeners_updated,
            s2s_updated,
            folder_removed,
            "Managed certificate dropped"
        );

        let restart = restart_if_running(self.service.as_ref()).await;
        Ok(CertificateReport {
            domain,
            cert_file: self.config.original.clone(),
            listeners_updated,
            s2s_updated,
            folder_removed,
            restart,
        })
    }

    fn read_material(&self, source: &CertificateSource) -> Result<String, CertificateError> {
        let read = |path: &PathBuf| {
            std::fs::read_to_string(path).map_err(|source| CertificateError::Io {
                path: path.clone(),
                source,
            })
        };
        let key = read(&source.key)?;
        let chain = read(&source.chain)?;

        pem::check_private_key(&key).map_err(|reason| CertificateError::InvalidMaterial {
            path: source.key.clone(),
            reason,
        })?;
        let certs = pem::check_chain(&chain).map_err(|reason| CertificateError::InvalidMaterial {
            path: source.chain.clone(),
            reason,
        })?;
        tracing::debug!(certs, key = ?source.key, "Certificate material verified");

        Ok(pem::concatenate(&key, &chain))
    }
}
