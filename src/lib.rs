//! Embedded backend-as-a-service host library.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use config::schema::HostConfig;
pub use http::HostServer;
pub use lifecycle::{App, HostContext, LifecycleState, Shutdown};
