//! Typed view of the service configuration document.
//!
//! Only the keys this tool reasons about are modelled; everything else is
//! collected, in document order, into the `extra` bags.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// YAML keys of the modelled fields.
pub mod keys {
    pub const HOSTS: &str = "hosts";
    pub const LISTEN: &str = "listen";
    pub const MODULES: &str = "modules";
    pub const S2S_CERTFILE: &str = "s2s_certfile";
    pub const AUTH_METHOD: &str = "auth_method";
    pub const LDAP_SERVERS: &str = "ldap_servers";
    pub const LDAP_BASE: &str = "ldap_base";
    pub const CERTFILE: &str = "certfile";
}

/// Parsed document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentModel {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hosts: Vec<String>,

    #[serde(default, rename = "listen", deserialize_with = "null_as_default")]
    pub listeners: Vec<Listener>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub modules: Mapping,

    #[serde(default, rename = "s2s_certfile")]
    pub s2s_cert_file: Option<String>,

    /// A single method or a list of them.
    #[serde(default)]
    pub auth_method: Option<Value>,

    #[serde(default)]
    pub ldap_servers: Option<Value>,

    #[serde(default)]
    pub ldap_base: Option<Value>,

    /// Keys not modelled above.
    #[serde(flatten)]
    pub extra: Mapping,
}

/// A network endpoint entry of `listen`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Listener {
    #[serde(default)]
    pub port: Option<Value>,

    #[serde(default)]
    pub module: Option<String>,

    #[serde(default, rename = "tls")]
    pub tls_enabled: Option<bool>,

    #[serde(default, rename = "certfile")]
    pub cert_file: Option<String>,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl DocumentModel {
    pub fn has_host(&self, domain: &str) -> bool {
        self.hosts.iter().any(|h| h == domain)
    }

    pub fn module(&self, name: &str) -> Option<&Value> {
        self.modules.get(name)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
