//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use pb_host::config::{HostConfig, ServiceConfig};
use pb_host::lifecycle::startup::{self, Host};
use pb_host::lifecycle::HostContext;
use tempfile::TempDir;

/// Host configuration with every listener on an ephemeral loopback port.
pub fn local_config(shutdown_secs: u64) -> HostConfig {
    let mut config = HostConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config.timeouts.shutdown_secs = shutdown_secs;
    config.pocketbase = ServiceConfig::default();
    config
}

/// Launch a host under a fresh storage root. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn launch(config: HostConfig) -> (TempDir, Host) {
    let root = tempfile::tempdir().unwrap();
    let host = startup::launch(&config, &HostContext::new(root.path()))
        .await
        .unwrap();
    (root, host)
}

/// Wait until the embedded handler has been published.
pub async fn wait_ready(host: &Host) {
    let service = host.app().service().unwrap();
    let _router = tokio::time::timeout(Duration::from_secs(5), service.on_serve().wait())
        .await
        .expect("embedded handler never published");
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap()
}
