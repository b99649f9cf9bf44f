//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults when absent)
//!     → validation.rs (semantic checks)
//!     → AdminConfig (validated, immutable)
//!     → handed to commands::Context
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; every invocation reads it fresh
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_or_default, LoadError};
pub use schema::{
    AdminConfig, AuthConfig, CertificateConfig, FrontendConfig, MigrationConfig, Ownership,
    ServiceConfig, TimeoutConfig, DEFAULT_CONFIG_PATH,
};
