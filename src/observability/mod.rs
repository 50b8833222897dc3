//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Adapter, admin API and forwarder produce:
//!     → logging.rs (structured log events, one span per embedded service)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the host listeners via `x-request-id`
//! - Metrics are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
