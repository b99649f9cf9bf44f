//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Paths the tool writes to must be absolute
//! - Timeouts must be non-zero
//! - File names must be plain names, not paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdminConfig → Result<(), Vec<ValidationError>>

use std::path::Path;

use thiserror::Error;

use crate::config::schema::AdminConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be an absolute path")]
    RelativePath { field: &'static str },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("{field} must be a plain file name")]
    BadFileName { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AdminConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let paths: [(&'static str, &Path); 11] = [
        ("service.ctl_path", &config.service.ctl_path),
        ("service.document_path", &config.service.document_path),
        ("service.spool_dir", &config.service.spool_dir),
        ("service.lock_path", &config.service.lock_path),
        ("certificates.original", &config.certificates.original),
        ("certificates.managed_dir", &config.certificates.managed_dir),
        ("certificates.source_dir", &config.certificates.source_dir),
        ("migration.backup_path", &config.migration.backup_path),
        ("migration.migrated_path", &config.migration.migrated_path),
        ("frontend.site_available", &config.frontend.site_available),
        ("frontend.site_enabled", &config.frontend.site_enabled),
    ];
    for (field, path) in paths {
        if !path.is_absolute() {
            errors.push(ValidationError::RelativePath { field });
        }
    }

    let timeouts = [
        ("timeouts.service_secs", config.timeouts.service_secs),
        ("timeouts.snapshot_secs", config.timeouts.snapshot_secs),
        ("timeouts.lock_secs", config.timeouts.lock_secs),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout { field });
        }
    }

    let names = [
        ("certificates.file_name", &config.certificates.file_name),
        ("certificates.key_file", &config.certificates.key_file),
        ("certificates.chain_file", &config.certificates.chain_file),
        ("migration.archive_dir", &config.migration.archive_dir),
    ];
    for (field, name) in names {
        if !is_plain_name(name) {
            errors.push(ValidationError::BadFileName { field });
        }
    }

    if config.service.name.is_empty() {
        errors.push(ValidationError::Empty { field: "service.name" });
    }
    if config.service.unit.is_empty() {
        errors.push(ValidationError::Empty { field: "service.unit" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
