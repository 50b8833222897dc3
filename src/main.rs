//! Embedded backend-as-a-service host.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                    HOST                        │
//!                        │                                                │
//!   Client ──────────────┼─▶ public listener ─▶ forwarder ──┐             │
//!                        │                                   │             │
//!                        │                                   ▼             │
//!                        │                          ┌─────────────────┐   │
//!                        │                          │ embedded service │   │
//!                        │                          │ (own listener)   │   │
//!                        │                          └────────▲────────┘   │
//!                        │                                   │             │
//!   Operator ────────────┼─▶ admin listener ─▶ superuser handlers          │
//!                        │                                                │
//!                        │  lifecycle adapter: provision → start → stop   │
//!                        └───────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use pb_host::config::loader::{load_config, load_service_block};
use pb_host::config::HostConfig;
use pb_host::lifecycle::{startup, HostContext};
use pb_host::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "pb-host")]
#[command(about = "Host process for an embedded backend service", long_about = None)]
struct Args {
    /// Host configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File holding a `pocketbase { ... }` block; replaces `[pocketbase]`.
    #[arg(long)]
    pocketbase_block: Option<PathBuf>,

    /// Storage root for the default data directory.
    #[arg(long)]
    storage_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => HostConfig::default(),
    };
    if let Some(path) = &args.pocketbase_block {
        config.pocketbase = load_service_block(path)?;
    }
    if let Some(root) = args.storage_root {
        config.storage.root = Some(root);
    }

    logging::init(config.observability.log_format)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pb-host starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let storage_root = config.storage.resolve_root();
    tracing::info!(
        public = %config.listener.bind_address,
        admin = %config.admin.bind_address,
        storage_root = %storage_root.display(),
        "Configuration loaded"
    );

    if let Err(e) = startup::run(config, HostContext::new(storage_root)).await {
        tracing::error!(error = %e, "pb-host failed");
        return Err(e.into());
    }
    Ok(())
}
