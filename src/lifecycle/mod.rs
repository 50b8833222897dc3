//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Adapter (adapter.rs):
//!     provision → resolve data_dir/listen, bind listener, bootstrap service
//!     start     → spawn the embedded serve task
//!     stop      → graceful shutdown (bounded) → join task → terminate hook
//!
//! Startup (startup.rs):
//!     Load config → Provision → Start → Bind host listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop host listeners → Stop adapter → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Single-use instance: no state is skipped, no restart
//! - Stop never short-circuits; every failure is reported
//! - Shutdown has a deadline: the serve task is aborted after it

pub mod adapter;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use adapter::{App, HostContext};
pub use shutdown::Shutdown;
pub use state::LifecycleState;
