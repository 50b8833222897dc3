//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the host process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Public listener; traffic here is forwarded to the embedded service.
    pub listener: ListenerConfig,

    /// Administrative listener serving `/pocketbase/`.
    pub admin: AdminConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Where default data directories are created.
    pub storage: StorageConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// The embedded service block.
    pub pocketbase: ServiceConfig,
}

/// User-settable fields of the embedded service.
///
/// Unset fields are resolved during provisioning: `listen` to a free loopback
/// port, `data_dir` to `<storage root>/pb_data`. Empty `origins` allows any
/// origin.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Listen address of the embedded server (`host:port`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Data directory of the embedded service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// CORS origins allowed by the embedded server.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API at all.
    pub enabled: bool,

    /// Optional API key; when set, requests need `Authorization: Bearer <key>`.
    pub api_key: Option<String>,

    /// Admin bind address. Keep this on loopback.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            bind_address: "127.0.0.1:2019".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout on the host listeners, in seconds.
    pub request_secs: u64,

    /// Deadline for draining the embedded server on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage root; defaults to `$XDG_DATA_HOME/pb-host` or
    /// `$HOME/.local/share/pb-host`, falling back to `./pb-host-data`.
    pub root: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured root, or the platform default.
    pub fn resolve_root(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
            return PathBuf::from(xdg).join("pb-host");
        }
        if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
            return PathBuf::from(home).join(".local/share/pb-host");
        }
        PathBuf::from("pb-host-data")
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log format for stdout.
    pub log_format: LogFormat,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: HostConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.admin.enabled);
        assert_eq!(config.timeouts.shutdown_secs, 10);
        assert_eq!(config.pocketbase, ServiceConfig::default());
    }

    #[test]
    fn test_pocketbase_section() {
        let config: HostConfig = toml::from_str(
            r#"
            [pocketbase]
            data_dir = "/srv/pb"
            listen = "127.0.0.1:8090"
            origins = ["https://a.example", "https://b.example"]
            "#,
        )
        .unwrap();
        assert_eq!(config.pocketbase.data_dir, Some(PathBuf::from("/srv/pb")));
        assert_eq!(config.pocketbase.listen.as_deref(), Some("127.0.0.1:8090"));
        assert_eq!(config.pocketbase.origins.len(), 2);
    }

    #[test]
    fn test_unknown_pocketbase_key_rejected() {
        let err = toml::from_str::<HostConfig>("[pocketbase]\nlisten_addr = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("listen_addr"), "{}", err);
    }

    #[test]
    fn test_explicit_storage_root() {
        let storage = StorageConfig {
            root: Some(PathBuf::from("/data")),
        };
        assert_eq!(storage.resolve_root(), PathBuf::from("/data"));
    }
}
