//! ejabberd configuration-state orchestration library.
//!
//! # Architecture Overview
//!
//! ```text
//!   commands (clap verbs, exit codes, instance lock)
//!       │
//!       ├── certificate ──┐
//!       ├── modules ──────┼──▶ document (ejabberd.yml: surgical edits, atomic store)
//!       ├── domains ──────┘
//!       ├── migration ────▶ NodeIdentityStore (ejabberdctl snapshots)
//!       │
//!       └── lifecycle (systemd units, nginx vhost, external processes, locks)
//!
//!   config (tool TOML)          observability (tracing → stderr)
//! ```

// Core subsystems
pub mod certificate;
pub mod document;
pub mod domains;
pub mod migration;
pub mod modules;

// Surface
pub mod commands;
pub mod config;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use commands::{run, Command, CommandError, Context, Outcome};
pub use config::AdminConfig;
pub use document::{ConfigDocument, ConfigStore};
