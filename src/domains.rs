//! Served domains.
//!
//! # Responsibilities
//! - Validate domain names before they are used as hosts or path components
//! - Resolve the primary domain of the instance
//! - Append new domains to `hosts`
//!
//! # Design Decisions
//! - Appending never deduplicates; a duplicate is reported, not resolved
//! - Registering a domain does not restart the service; a certificate
//!   switch usually follows and restarts it once

use thiserror::Error;

use crate::document::{ConfigDocument, ConfigStore, DocumentError, StoreError};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid domain name {0:?}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Check that `domain` is a plausible DNS name usable as a directory name.
pub fn validate_domain(domain: &str) -> Result<(), DomainError> {
    let valid = !domain.is_empty()
        && domain.len() <= 253
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(DomainError::Invalid(domain.to_string()))
    }
}

/// The configured primary domain, or the first served host.
pub fn primary_domain(configured: Option<&str>, doc: &ConfigDocument) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| doc.hosts().first().cloned())
}

/// Result of registering a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub domain: String,
    /// The domain was already listed before this append.
    pub duplicate: bool,
}

/// Appends domains to the document's `hosts`.
pub struct DomainRegistrar {
    store: ConfigStore,
}

impl DomainRegistrar {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub async fn add_domain(&self, domain: &str) -> Result<Registration, DomainError> {
        validate_domain(domain)?;

        let duplicate = self.store.update(|doc| {
            let duplicate = doc.model().has_host(domain);
            doc.push_host(domain)?;
            Ok::<_, DomainError>(duplicate)
        }).await?;

        if duplicate {
            tracing::warn!(domain = %domain, "Domain was already listed in hosts; appended a duplicate entry");
        } else {
            tracing::info!(domain = %domain, "Domain added to hosts");
        }

        Ok(Registration {
            domain: domain.to_string(),
            duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_names_are_checked() {
        assert!(validate_domain("chat.example.org").is_ok());
        assert!(validate_domain("xn--bcher-kva.example").is_ok());
        assert!(validate_domain("").is_err());
        assert!(validate_domain("../etc").is_err());
        assert!(validate_domain("a/b.org").is_err());
        assert!(validate_domain("a..org").is_err());
    }

    #[test]
    fn primary_domain_prefers_configuration() {
        let doc = ConfigDocument::parse("hosts: [first.org, second.org]\n").unwrap();
        assert_eq!(primary_domain(None, &doc).as_deref(), Some("first.org"));
        assert_eq!(primary_domain(Some("second.org"), &doc).as_deref(), Some("second.org"));

        let empty = ConfigDocument::parse("loglevel: 4\n").unwrap();
        assert_eq!(primary_domain(None, &empty), None);
    }
}
