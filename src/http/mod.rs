//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Public listener
//!     → server.rs (request ID, limits, timeout, trace)
//!     → forward.rs (admin prefix → 404, not ready → 503)
//!     → embedded service router
//!
//! Admin listener
//!     → server.rs (same layers)
//!     → admin (bearer check → superuser handlers)
//! ```

pub mod forward;
pub mod server;

pub use server::{HostServer, X_REQUEST_ID};
