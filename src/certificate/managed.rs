//! Managed certificate artifacts on disk.

use std::ffi::OsStr;
use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::config::{CertificateConfig, Ownership};
use crate::lifecycle::process::{self, ProcessError};

const CERT_MODE: u32 = 0o600;
const FOLDER_MODE: u32 = 0o750;

/// Externally issued key and chain for one domain.
#[derive(Debug, Clone)]
pub struct CertificateSource {
    pub dir: PathBuf,
    pub key: PathBuf,
    pub chain: PathBuf,
}

impl CertificateSource {
    pub fn for_domain(config: &CertificateConfig, domain: &str) -> Self {
        let dir = config.source_dir.join(domain);
        Self {
            key: dir.join(&config.key_file),
            chain: dir.join(&config.chain_file),
            dir,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.dir.is_dir() && self.key.is_file() && self.chain.is_file()
    }
}

/// The certificate this tool assembles for a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedCertificate {
    pub domain: String,
    pub folder: PathBuf,
    pub file: PathBuf,
}

impl ManagedCertificate {
    pub fn for_domain(config: &CertificateConfig, domain: &str) -> Self {
        let folder = config.managed_dir.join(domain);
        Self {
            domain: domain.to_string(),
            file: folder.join(&config.file_name),
            folder,
        }
    }

    /// Path as it is written into the document.
    pub fn file_str(&self) -> String {
        self.file.to_string_lossy().into_owned()
    }

    /// Write `contents` to the certificate file, owner read/write only.
    /// The folder is created when missing.
    pub fn write(&self, contents: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.folder)?;
        fs::set_permissions(&self.folder, fs::Permissions::from_mode(FOLDER_MODE))?;

        let mut tmp = NamedTempFile::new_in(&self.folder)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(CERT_MODE))?;
        tmp.persist(&self.file).map_err(|e| e.error)?;
        Ok(())
    }

    /// Hand the folder and certificate to the service's runtime user.
    pub async fn chown(&self, owner: &Ownership, timeout: Duration) -> Result<(), ProcessError> {
        let user_group = owner.to_string();
        let args = [OsStr::new("-R"), OsStr::new(&user_group), self.folder.as_os_str()];
        process::run("chown", args, timeout).await.map(|_| ())
    }

    /// Remove the certificate folder. Returns whether it existed.
    pub fn remove(&self) -> std::io::Result<bool> {
        match fs::remove_dir_all(&self.folder) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
