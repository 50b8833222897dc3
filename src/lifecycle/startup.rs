//! Startup orchestration.
//!
//! # Responsibilities
//! - Provision and start the embedded service
//! - Bind the public and admin listeners and serve them
//! - On termination, stop the host listeners, then the embedded service
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last, after the adapter is running
//! - A listener that cannot be bound stops the adapter before returning

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::HostConfig;
use crate::error::{ProvisionError, StartError, StopError};
use crate::http::server::{self, HostServer};
use crate::lifecycle::adapter::{App, HostContext};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_termination;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error("failed to bind {listener} listener on {address}: {source}")]
    Bind {
        listener: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Stop(#[from] StopError),
}

/// A running host: the adapter plus the listeners in front of it.
pub struct Host {
    app: App,
    shutdown: Shutdown,
    deadline: Duration,
    public_addr: SocketAddr,
    admin_addr: Option<SocketAddr>,
    tasks: Vec<(&'static str, JoinHandle<std::io::Result<()>>)>,
}

impl Host {
    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn public_addr(&self) -> SocketAddr {
        self.public_addr
    }

    /// `None` when the admin API is disabled.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    /// Stop accepting on the host listeners, then stop the embedded service.
    ///
    /// Host listeners get the same deadline as the embedded server; a
    /// listener that does not drain in time is aborted and logged.
    pub async fn shutdown(mut self) -> Result<(), StopError> {
        tracing::info!(deadline = ?self.deadline, "Shutting down host listeners");
        self.shutdown.trigger();

        for (name, mut task) in self.tasks.drain(..) {
            match tokio::time::timeout(self.deadline, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => tracing::warn!(listener = name, error = %e, "Listener failed"),
                Ok(Err(e)) => tracing::warn!(listener = name, error = %e, "Listener task panicked"),
                Err(_) => {
                    task.abort();
                    tracing::warn!(listener = name, "Listener did not drain in time");
                }
            }
        }

        self.app.stop(self.deadline).await
    }
}

/// Provision and start the adapter, then serve the host listeners.
pub async fn launch(config: &HostConfig, host: &HostContext) -> Result<Host, StartupError> {
    let deadline = Duration::from_secs(config.timeouts.shutdown_secs);

    let mut app = App::new(config.pocketbase.clone());
    app.provision(host).await?;
    app.start()?;

    let Some(service) = app.service() else {
        return Err(StartError::NotProvisioned.into());
    };
    let routers = HostServer::new(config, service);
    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let public = match bind("public", &config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => return Err(abandon(app, deadline, e).await),
    };
    let public_addr = match public.local_addr() {
        Ok(addr) => addr,
        Err(source) => {
            let e = StartupError::Bind {
                listener: "public",
                address: config.listener.bind_address.clone(),
                source,
            };
            return Err(abandon(app, deadline, e).await);
        }
    };
    tasks.push((
        "public",
        tokio::spawn(server::run(
            public,
            routers.public_router(),
            "public",
            shutdown.signaled(),
        )),
    ));

    let mut admin_addr = None;
    if let Some(admin_router) = routers.admin_router() {
        let admin = match bind("admin", &config.admin.bind_address).await {
            Ok(listener) => listener,
            Err(e) => {
                shutdown.trigger();
                return Err(abandon(app, deadline, e).await);
            }
        };
        admin_addr = admin.local_addr().ok();
        tasks.push((
            "admin",
            tokio::spawn(server::run(admin, admin_router, "admin", shutdown.signaled())),
        ));
    }

    tracing::info!(
        public = %public_addr,
        admin = ?admin_addr,
        embedded = ?app.listen_addr(),
        "Host ready"
    );

    Ok(Host {
        app,
        shutdown,
        deadline,
        public_addr,
        admin_addr,
        tasks,
    })
}

/// Run the host until SIGINT or SIGTERM, then shut it down.
pub async fn run(config: HostConfig, host: HostContext) -> Result<(), StartupError> {
    let running = launch(&config, &host).await?;
    wait_for_termination().await;
    running.shutdown().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(listener: &'static str, address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            listener,
            address: address.to_string(),
            source,
        })
}

async fn abandon(mut app: App, deadline: Duration, cause: StartupError) -> StartupError {
    if let Err(e) = app.stop(deadline).await {
        tracing::warn!(error = %e, "Embedded service did not stop cleanly");
    }
    cause
}
