//! Command results and exit codes.

use thiserror::Error;

use crate::certificate::CertificateError;
use crate::config::LoadError;
use crate::document::{DocumentError, StoreError};
use crate::domains::DomainError;
use crate::lifecycle::{LockError, ProcessError, RestartOutcome};
use crate::migration::MigrationError;
use crate::modules::ModuleError;

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    pub const OTHER: u8 = 1;
    pub const DOMAIN_NOT_CONFIGURED: u8 = 10;
    pub const FOREIGN_DOMAIN_CERTIFICATE: u8 = 11;
    pub const SOURCE_CERTIFICATE_MISSING: u8 = 12;
    pub const INVALID_ARGUMENT: u8 = 13;
    pub const SNAPSHOT_MISSING: u8 = 20;
    pub const MIGRATION_FAILED: u8 = 21;
    pub const CONFIG_IO: u8 = 30;
    pub const EXTERNAL_PROCESS: u8 = 31;
    pub const TOOL_CONFIG_INVALID: u8 = 32;
}

/// Any failure of a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid tool configuration: {0}")]
    Config(#[from] LoadError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to toggle the web front-end: {0}")]
    Frontend(#[source] std::io::Error),

    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CommandError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CommandError::Config(_) => exit::TOOL_CONFIG_INVALID,
            CommandError::Lock(_) => exit::CONFIG_IO,
            CommandError::Certificate(e) => certificate_code(e),
            CommandError::Module(e) => match e {
                ModuleError::InvalidName(_) => exit::INVALID_ARGUMENT,
                ModuleError::InvalidDefaults { .. } | ModuleError::Conversion { .. } => {
                    exit::TOOL_CONFIG_INVALID
                }
                ModuleError::Store(_) | ModuleError::Document(_) => exit::CONFIG_IO,
            },
            CommandError::Domain(e) => domain_code(e),
            CommandError::Migration(e) => migration_code(e),
            CommandError::Store(_) | CommandError::Document(_) => exit::CONFIG_IO,
            CommandError::Process(_) => exit::EXTERNAL_PROCESS,
            CommandError::Frontend(_) => exit::CONFIG_IO,
            CommandError::Output(_) => exit::OTHER,
        }
    }
}

fn domain_code(e: &DomainError) -> u8 {
    match e {
        DomainError::Invalid(_) => exit::INVALID_ARGUMENT,
        DomainError::Store(_) | DomainError::Document(_) => exit::CONFIG_IO,
    }
}

fn certificate_code(e: &CertificateError) -> u8 {
    match e {
        CertificateError::DomainNotConfigured(_) => exit::DOMAIN_NOT_CONFIGURED,
        CertificateError::ForeignDomain { .. } => exit::FOREIGN_DOMAIN_CERTIFICATE,
        CertificateError::SourceMissing { .. } | CertificateError::InvalidMaterial { .. } => {
            exit::SOURCE_CERTIFICATE_MISSING
        }
        CertificateError::NoPrimaryDomain => exit::INVALID_ARGUMENT,
        CertificateError::Domain(e) => domain_code(e),
        CertificateError::Ownership(_) => exit::EXTERNAL_PROCESS,
        CertificateError::Io { .. } | CertificateError::Store(_) | CertificateError::Document(_) => {
            exit::CONFIG_IO
        }
    }
}

fn migration_code(e: &MigrationError) -> u8 {
    match e {
        MigrationError::ToolMissing => exit::SUCCESS,
        MigrationError::InvalidHost(e) => domain_code(e),
        MigrationError::RenameFailed { .. } | MigrationError::Import { .. } => exit::MIGRATION_FAILED,
        MigrationError::Export(_) | MigrationError::Stop(_) | MigrationError::Start(_) => {
            exit::EXTERNAL_PROCESS
        }
        MigrationError::Quarantine { .. } | MigrationError::Io { .. } => exit::CONFIG_IO,
    }
}

/// What a command that ran to completion reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Result printed on stdout.
    pub output: Option<String>,
    /// Non-fatal problems, printed on stderr.
    pub warnings: Vec<String>,
    pub exit_code: u8,
}

impl Outcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Record a warning; the highest exit code wins.
    pub fn warn(mut self, message: impl Into<String>, exit_code: u8) -> Self {
        self.warnings.push(message.into());
        self.exit_code = self.exit_code.max(exit_code);
        self
    }

    /// A failed restart after a persisted edit is reported, not rolled back.
    pub fn restart(self, service: &str, outcome: &RestartOutcome) -> Self {
        match outcome {
            RestartOutcome::Failed(reason) => self.warn(
                format!("change saved but {service} failed to restart: {reason}"),
                exit::EXTERNAL_PROCESS,
            ),
            _ => self,
        }
    }
}
