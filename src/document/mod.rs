//! Service configuration document subsystem.
//!
//! # Data Flow
//! ```text
//! ejabberd.yml
//!     → store.rs (exclusive lock, read)
//!     → ConfigDocument { editor.rs text, model.rs typed view }
//!     → operation mutates through ConfigDocument methods
//!         → editor.rs patches the affected lines only
//!         → model.rs re-derived from the patched text
//!     → store.rs (temp file, fsync, rename, unlock)
//! ```
//!
//! # Design Decisions
//! - The text is the source of truth; the typed view is always derived
//! - Every mutation names the keys it touches; nothing else is rewritten
//! - A patch that does not parse back is rejected before it can be stored

pub mod editor;
pub mod model;
pub mod store;

use serde_yaml::Mapping;
use thiserror::Error;

use self::editor::{EditError, YamlText};
use self::model::keys;
pub use self::model::{DocumentModel, Listener};
pub use self::store::{ConfigStore, StoreError};

/// Errors raised while reading or editing a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_yaml::Error),

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// The service configuration document: original text plus typed view.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    text: YamlText,
    model: DocumentModel,
}

impl ConfigDocument {
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let model = serde_yaml::from_str(source)?;
        Ok(Self {
            text: YamlText::parse(source),
            model,
        })
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    pub fn hosts(&self) -> &[String] {
        &self.model.hosts
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.model.listeners
    }

    pub fn s2s_cert_file(&self) -> Option<&str> {
        self.model.s2s_cert_file.as_deref()
    }

    /// Serialized form, byte-identical to the input outside edited lines.
    pub fn render(&self) -> String {
        self.text.render()
    }

    /// Points `s2s_certfile` at `path`. Returns whether the value changed.
    pub fn set_s2s_cert_file(&mut self, path: &str) -> Result<bool, DocumentError> {
        self.apply(|text| Ok(text.set_top_level_scalar(keys::S2S_CERTFILE, path)))
    }

    /// Offers every listener's declared `certfile` to `rewrite`. Listeners
    /// without a certificate are left alone. Returns how many changed.
    ///
    /// Fails without editing anything when a listener declaring a
    /// certificate is written in a layout the editor cannot reach.
    pub fn rewrite_listener_cert_files<F>(&mut self, rewrite: F) -> Result<usize, DocumentError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let declared = self
            .model
            .listeners
            .iter()
            .filter(|l| l.cert_file.is_some())
            .count();
        self.apply(|text| {
            let result = text.rewrite_item_field(keys::LISTEN, keys::CERTFILE, rewrite)?;
            if result.visited < declared {
                return Err(EditError::UnsupportedLayout {
                    key: format!("{}.{}", keys::LISTEN, keys::CERTFILE),
                    reason: "listener not in block style",
                }
                .into());
            }
            Ok(result.changed)
        })
    }

    /// Appends a domain to `hosts`.
    pub fn push_host(&mut self, domain: &str) -> Result<(), DocumentError> {
        self.apply(|text| Ok(text.append_to_sequence(keys::HOSTS, domain)?))
    }

    /// Inserts or replaces a module's settings. Returns whether the text changed.
    pub fn set_module(&mut self, name: &str, settings: &Mapping) -> Result<bool, DocumentError> {
        self.apply(|text| Ok(text.upsert_mapping_child(keys::MODULES, name, settings)?))
    }

    /// Removes a module. Returns whether it was present.
    pub fn remove_module(&mut self, name: &str) -> Result<bool, DocumentError> {
        let present = self.model.module(name).is_some();
        self.apply(|text| {
            let removed = text.remove_mapping_child(keys::MODULES, name);
            if present && !removed {
                return Err(EditError::UnsupportedLayout {
                    key: format!("{}.{name}", keys::MODULES),
                    reason: "module not in block style",
                }
                .into());
            }
            Ok(removed)
        })
    }

    /// Writes the authentication settings.
    pub fn set_auth(
        &mut self,
        method: &str,
        servers: &[String],
        base: &str,
    ) -> Result<bool, DocumentError> {
        self.apply(|text| {
            let mut changed = text.set_top_level_scalar(keys::AUTH_METHOD, method);
            changed |= text.set_top_level_flow_list(keys::LDAP_SERVERS, servers);
            changed |= text.set_top_level_scalar(keys::LDAP_BASE, base);
            Ok(changed)
        })
    }

    /// Runs an edit on a copy of the text and commits it only if the
    /// result still parses.
    fn apply<T, F>(&mut self, edit: F) -> Result<T, DocumentError>
    where
        F: FnOnce(&mut YamlText) -> Result<T, DocumentError>,
    {
        let mut text = self.text.clone();
        let out = edit(&mut text)?;
        if text != self.text {
            self.model = serde_yaml::from_str(&text.render())?;
            self.text = text;
        }
        Ok(out)
    }
}
