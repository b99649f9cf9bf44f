//! Optional feature modules.
//!
//! # Responsibilities
//! - Report whether a module is enabled (present under `modules`)
//! - Enable a module with its documented default settings
//! - Disable a module by removing its entry
//!
//! # Design Decisions
//! - `enable` always resets the entry to the same defaults, so repeating it is
//!   a no-op on the text
//! - The service is restarted only when the document actually changed, and
//!   only if it is running

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::document::{ConfigStore, DocumentError, StoreError};
use crate::lifecycle::{restart_if_running, RestartOutcome, ServiceControl};

/// Message archive management.
pub const MOD_MAM: &str = "mod_mam";

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("invalid module name {0:?}")]
    InvalidName(String),

    #[error("default settings of {module} are not a mapping")]
    InvalidDefaults { module: String },

    #[error("default settings of {module} cannot be converted: {source}")]
    Conversion {
        module: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Whether a module is present in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Enabled,
    Disabled,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Enabled => f.write_str("enabled"),
            ModuleStatus::Disabled => f.write_str("disabled"),
        }
    }
}

/// Result of a module toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleReport {
    pub module: String,
    pub status: ModuleStatus,
    pub changed: bool,
    pub restart: RestartOutcome,
}

/// Module names are written as mapping keys; keep them to plain identifiers.
pub fn validate_module_name(name: &str) -> Result<(), ModuleError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ModuleError::InvalidName(name.to_string()))
    }
}

/// Built-in defaults for modules the tool knows about.
pub fn builtin_defaults(module: &str) -> Mapping {
    let mut settings = Mapping::new();
    if module == MOD_MAM {
        settings.insert("queue_type".into(), "ram".into());
        settings.insert("db_type".into(), "mnesia".into());
        settings.insert("default".into(), "always".into());
        settings.insert("cache_size".into(), 1000.into());
        settings.insert("cache_life_time".into(), 3600.into());
    }
    settings
}

/// Convert per-module defaults from the tool configuration into the
/// document's representation.
pub fn defaults_from_table(module: &str, table: &toml::Table) -> Result<Mapping, ModuleError> {
    let value = serde_yaml::to_value(table).map_err(|source| ModuleError::Conversion {
        module: module.to_string(),
        source,
    })?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ModuleError::InvalidDefaults {
            module: module.to_string(),
        }),
    }
}

/// Enables and disables optional modules of the service.
pub struct ModuleToggle {
    store: ConfigStore,
    defaults: BTreeMap<String, toml::Table>,
    service: Arc<dyn ServiceControl>,
}

impl ModuleToggle {
    pub fn new(store: ConfigStore, service: Arc<dyn ServiceControl>) -> Self {
        Self {
            store,
            defaults: BTreeMap::new(),
            service,
        }
    }

    /// Per-module defaults overriding the built-in ones.
    pub fn with_defaults(mut self, defaults: BTreeMap<String, toml::Table>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Settings `enable` writes for `name`.
    pub fn defaults_for(&self, name: &str) -> Result<Mapping, ModuleError> {
        match self.defaults.get(name) {
            Some(table) => defaults_from_table(name, table),
            None => Ok(builtin_defaults(name)),
        }
    }

    pub fn status(&self, name: &str) -> Result<ModuleStatus, ModuleError> {
        validate_module_name(name)?;
        let doc = self.store.load()?;
        Ok(if doc.model().module(name).is_some() {
            ModuleStatus::Enabled
        } else {
            ModuleStatus::Disabled
        })
    }

    pub async fn enable(&self, name: &str) -> Result<ToggleReport, ModuleError> {
        let settings = self.defaults_for(name)?;
        self.enable_with(name, &settings).await
    }

    /// Insert or replace `name` with exactly `settings`.
    pub async fn enable_with(&self, name: &str, settings: &Mapping) -> Result<ToggleReport, ModuleError> {
        validate_module_name(name)?;
        let changed = self
            .store
            .update(|doc| Ok::<_, ModuleError>(doc.set_module(name, settings)?))
            .await?;
        tracing::info!(module = %name, changed, "Module enabled");
        self.finish(name, ModuleStatus::Enabled, changed).await
    }

    pub async fn disable(&self, name: &str) -> Result<ToggleReport, ModuleError> {
        validate_module_name(name)?;
        let changed = self
            .store
            .update(|doc| Ok::<_, ModuleError>(doc.remove_module(name)?))
            .await?;
        if changed {
            tracing::info!(module = %name, "Module disabled");
        } else {
            tracing::info!(module = %name, "Module was not enabled");
        }
        self.finish(name, ModuleStatus::Disabled, changed).await
    }

    async fn finish(
        &self,
        name: &str,
        status: ModuleStatus,
        changed: bool,
    ) -> Result<ToggleReport, ModuleError> {
        let restart = if changed {
            restart_if_running(self.service.as_ref()).await
        } else {
            RestartOutcome::NotRunning
        };
        Ok(ToggleReport {
            module: name.to_string(),
            status,
            changed,
            restart,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_are_identifiers() {
        assert!(validate_module_name("mod_mam").is_ok());
        assert!(validate_module_name("mod-muc").is_ok());
        assert!(validate_module_name("").is_err());
        assert!(validate_module_name("mod mam").is_err());
        assert!(validate_module_name("mod:x").is_err());
    }

    #[test]
    fn archive_module_has_builtin_defaults() {
        let settings = builtin_defaults(MOD_MAM);
        assert_eq!(settings.get("default"), Some(&Value::from("always")));
        assert_eq!(settings.get("cache_size"), Some(&Value::from(1000)));
        assert!(builtin_defaults("mod_unknown").is_empty());
    }

    #[test]
    fn configured_defaults_convert_to_mapping() {
        let table: toml::Table = toml::from_str("db_type = \"sql\"\ncache_size = 10\n").unwrap();
        let settings = defaults_from_table(MOD_MAM, &table).unwrap();
        assert_eq!(settings.get("db_type"), Some(&Value::from("sql")));
        assert_eq!(settings.get("cache_size"), Some(&Value::from(10)));
    }
}
