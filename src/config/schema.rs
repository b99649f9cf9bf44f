//! Configuration schema definitions.
//!
//! This module defines the settings of the admin tool itself (where the
//! service lives, which paths it owns, how long external calls may take).
//! The service's own document (`ejabberd.yml`) is modelled in `crate::document`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default location of the tool configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ejabberd-admin/config.toml";

/// Root configuration for the admin tool.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// The managed service (unit, user, document, spool).
    pub service: ServiceConfig,

    /// Certificate locations.
    pub certificates: CertificateConfig,

    /// Snapshot locations used by hostname migration.
    pub migration: MigrationConfig,

    /// Web front-end vhost.
    pub frontend: FrontendConfig,

    /// Values written by `setup`.
    pub auth: AuthConfig,

    /// Timeouts for external calls and locks.
    pub timeouts: TimeoutConfig,

    /// Default settings per optional module, keyed by module name.
    pub modules: BTreeMap<String, toml::Table>,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Managed service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, used as the node identity prefix (`<name>@<host>`).
    pub name: String,

    /// Systemd unit controlling the service.
    pub unit: String,

    /// Runtime user owning the service's files and processes.
    pub user: Option<String>,

    /// Runtime group; defaults to the user when unset.
    pub group: Option<String>,

    /// Path to the management tool.
    pub ctl_path: PathBuf,

    /// Path to the service configuration document.
    pub document_path: PathBuf,

    /// Persistent store directory.
    pub spool_dir: PathBuf,

    /// Primary domain. When unset the first entry of `hosts` is used.
    pub primary_domain: Option<String>,

    /// Lock file serializing all mutating operations on this instance.
    pub lock_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "ejabberd".to_string(),
            unit: "ejabberd".to_string(),
            user: Some("ejabberd".to_string()),
            group: None,
            ctl_path: PathBuf::from("/usr/sbin/ejabberdctl"),
            document_path: PathBuf::from("/etc/ejabberd/ejabberd.yml"),
            spool_dir: PathBuf::from("/var/lib/ejabberd"),
            primary_domain: None,
            lock_path: PathBuf::from("/run/lock/ejabberd-admin.lock"),
        }
    }
}

impl ServiceConfig {
    /// Owner to apply to files handed to the service, if any.
    pub fn ownership(&self) -> Option<Ownership> {
        self.user.as_ref().map(|user| Ownership {
            user: user.clone(),
            group: self.group.clone().unwrap_or_else(|| user.clone()),
        })
    }
}

/// A `user:group` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    pub user: String,
    pub group: String,
}

impl std::fmt::Display for Ownership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.user, self.group)
    }
}

/// Certificate locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Default self-signed certificate shipped with the service.
    pub original: PathBuf,

    /// Base directory of managed certificates (`<managed_dir>/<domain>/`).
    pub managed_dir: PathBuf,

    /// File name of the assembled certificate inside a domain folder.
    pub file_name: String,

    /// Directory holding externally issued material (`<source_dir>/<domain>/`).
    pub source_dir: PathBuf,

    /// Private key file name inside a source domain folder.
    pub key_file: String,

    /// Full chain file name inside a source domain folder.
    pub chain_file: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            original: PathBuf::from("/etc/ejabberd/ejabberd.pem"),
            managed_dir: PathBuf::from("/etc/ejabberd/letsencrypt"),
            file_name: "service.pem".to_string(),
            source_dir: PathBuf::from("/etc/letsencrypt/live"),
            key_file: "privkey.pem".to_string(),
            chain_file: "fullchain.pem".to_string(),
        }
    }
}

/// Hostname migration paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Snapshot exported under the old node identity.
    pub backup_path: PathBuf,

    /// Snapshot re-tagged with the new node identity.
    pub migrated_path: PathBuf,

    /// Subdirectory of the spool dir receiving quarantined store files.
    pub archive_dir: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            backup_path: PathBuf::from("/var/backups/ejabberd/pre-rename.backup"),
            migrated_path: PathBuf::from("/var/backups/ejabberd/post-rename.backup"),
            archive_dir: "archive".to_string(),
        }
    }
}

/// Web front-end vhost.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Systemd unit of the web server.
    pub unit: String,

    /// Vhost file in the web server's available-sites directory.
    pub site_available: PathBuf,

    /// Symlink location in the enabled-sites directory.
    pub site_enabled: PathBuf,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            unit: "nginx".to_string(),
            site_available: PathBuf::from("/etc/nginx/sites-available/ejabberd.conf"),
            site_enabled: PathBuf::from("/etc/nginx/sites-enabled/ejabberd.conf"),
        }
    }
}

/// Authentication settings applied by `setup`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub method: String,
    pub servers: Vec<String>,
    pub base: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: "ldap".to_string(),
            servers: vec!["localhost".to_string()],
            base: "ou=users,dc=yunohost,dc=org".to_string(),
        }
    }
}

/// Timeouts, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Service start/stop/restart.
    pub service_secs: u64,

    /// Snapshot export, rename and restore.
    pub snapshot_secs: u64,

    /// Waiting for the operation lock.
    pub lock_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            service_secs: 120,
            snapshot_secs: 900,
            lock_secs: 300,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
