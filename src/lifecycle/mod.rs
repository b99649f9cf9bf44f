//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Mutating command:
//!     lock.rs (instance-wide exclusive lock, bounded wait)
//!     → operation edits the document / moves files
//!     → service.rs restart_if_running (never starts a stopped service)
//!
//! Migration:
//!     service.rs stop → terminate user processes → start
//!
//! External calls (process.rs):
//!     systemctl / pkill / chown / ejabberdctl with a deadline
//! ```
//!
//! # Design Decisions
//! - Service state is queried through `ServiceControl`, not assumed
//! - Timeouts are bounded but generous; failures are surfaced
//! - flock(2) locks are released by the kernel if the process dies

pub mod frontend;
pub mod lock;
pub mod process;
pub mod service;

pub use frontend::WebFrontend;
pub use lock::{LockError, OperationLock};
pub use process::ProcessError;
pub use service::{restart_if_running, RestartOutcome, ServiceControl, SystemdUnit};
