//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! host config file (TOML)          pocketbase { ... } block
//!     → loader.rs (deserialize)        → directive.rs (tokenize & parse)
//!     → validation.rs (semantic checks)
//!     → HostConfig / ServiceConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Unknown keys in the service block fail immediately
//! - Validation separates syntactic (serde) from semantic checks

pub mod directive;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::AdminConfig;
pub use schema::HostConfig;
pub use schema::ListenerConfig;
pub use schema::ServiceConfig;
