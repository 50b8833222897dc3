//! Embedded service lifecycle adapter.
//!
//! # Responsibilities
//! - Resolve the data directory and listen address, bind the listener
//! - Bootstrap the embedded service on the resolved data directory
//! - Run the embedded server on one background task
//! - Stop it within a deadline and report every failure

use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::ServiceConfig;
use crate::error::{ProvisionError, StartError, StopError, StopFailure};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::LifecycleState;
use crate::observability::metrics;
use crate::service::{self, ServeConfig, Service, ServiceSettings};

/// Address bound when no listen address is configured.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:0";

/// Name of the data directory created under the storage root.
pub const DATA_DIR_NAME: &str = "pb_data";

/// What the host process hands to the adapter.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// Root under which the default data directory is created.
    pub storage_root: PathBuf,
    /// Parent span; adapter logs and the serve task are recorded under it.
    pub span: tracing::Span,
}

impl HostContext {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            span: tracing::info_span!("pocketbase"),
        }
    }
}

/// Owns the embedded service and its serve task for one provision/start/stop
/// cycle.
pub struct App {
    config: ServiceConfig,
    state: LifecycleState,
    data_dir: Option<PathBuf>,
    listen_addr: Option<SocketAddr>,
    listener: Option<TcpListener>,
    service: Option<Arc<Service>>,
    span: tracing::Span,
    shutdown: Shutdown,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl App {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            state: LifecycleState::Unprovisioned,
            data_dir: None,
            listen_addr: None,
            listener: None,
            service: None,
            span: tracing::Span::none(),
            shutdown: Shutdown::new(),
            task: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Resolved data directory; `None` before provisioning.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Resolved listen address; `None` before provisioning.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }

    /// Shared handle to the embedded service for delegation.
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.clone()
    }

    /// The embedded server's request handler, once it reported ready.
    pub fn handler(&self) -> Option<Router> {
        self.service.as_ref().and_then(|s| s.on_serve().get())
    }

    /// Resolve defaults, allocate the listener and bootstrap the service.
    ///
    /// The bound listener is kept and later handed to the serve task, so the
    /// chosen port cannot be taken by someone else in between.
    pub async fn provision(&mut self, host: &HostContext) -> Result<(), ProvisionError> {
        if self.state != LifecycleState::Unprovisioned {
            return Err(ProvisionError::AlreadyProvisioned(self.state));
        }

        self.span = host.span.clone();
        let span = self.span.clone();
        let result = self.provision_inner(&host.storage_root).instrument(span).await;

        match result {
            Ok(()) => self.transition(LifecycleState::Provisioned),
            Err(ref e) => {
                tracing::error!(parent: &self.span, error = %e, "Provisioning failed");
                self.transition(LifecycleState::Failed);
            }
        }
        result
    }

    async fn provision_inner(&mut self, storage_root: &Path) -> Result<(), ProvisionError> {
        let data_dir = self
            .config
            .data_dir
            .clone()
            .unwrap_or_else(|| storage_root.join(DATA_DIR_NAME));
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|source| ProvisionError::Directory {
                path: data_dir.clone(),
                source,
            })?;

        let address = self.config.listen.as_deref().unwrap_or(DEFAULT_LISTEN);
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ProvisionError::PortAllocation {
                address: address.to_string(),
                source,
            })?;
        let listen_addr = listener
            .local_addr()
            .map_err(|source| ProvisionError::PortAllocation {
                address: address.to_string(),
                source,
            })?;

        let service = Arc::new(Service::new(ServiceSettings {
            data_dir: data_dir.clone(),
        }));
        service.bootstrap().map_err(ProvisionError::Bootstrap)?;

        tracing::info!(
            data_dir = %service.data_dir().display(),
            listen = %listen_addr,
            origins = ?self.config.origins,
            "Embedded service provisioned"
        );

        self.data_dir = Some(data_dir);
        self.listen_addr = Some(listen_addr);
        self.listener = Some(listener);
        self.service = Some(service);
        Ok(())
    }

    /// Spawn the serve task and return without waiting for it to accept.
    ///
    /// Errors from the task are only observed by [`App::stop`].
    pub fn start(&mut self) -> Result<(), StartError> {
        match self.state {
            LifecycleState::Provisioned => {}
            LifecycleState::Unprovisioned => return Err(StartError::NotProvisioned),
            other => return Err(StartError::InvalidState(other)),
        }

        let (Some(listener), Some(embedded)) = (self.listener.take(), self.service.clone()) else {
            self.transition(LifecycleState::Failed);
            return Err(StartError::InvalidState(self.state));
        };

        let config = ServeConfig {
            allowed_origins: self.config.origins.clone(),
            show_start_banner: true,
        };
        let signal = self.shutdown.signaled();
        let serve = service::serve(embedded, listener, config, signal);
        self.task = Some(tokio::spawn(serve.instrument(self.span.clone())));

        self.transition(LifecycleState::Running);
        Ok(())
    }

    /// Shut the embedded server down, waiting at most `deadline` for open
    /// connections to drain, then run the termination hook.
    ///
    /// Every failure encountered is collected into the returned error.
    pub async fn stop(&mut self, deadline: Duration) -> Result<(), StopError> {
        if self.state != LifecycleState::Running {
            return StopError::from_failures(vec![StopFailure::NotRunning(self.state)]);
        }

        let mut failures = Vec::new();
        tracing::info!(parent: &self.span, deadline = ?deadline, "Stopping embedded server");
        self.shutdown.trigger();

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(deadline, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => failures.push(StopFailure::Task(e)),
                Ok(Err(join_err)) => failures.push(StopFailure::Panicked(join_err.to_string())),
                Err(_) => {
                    task.abort();
                    failures.push(StopFailure::Timeout(deadline));
                }
            }
        }

        if let Some(service) = &self.service {
            if let Err(errors) = service.terminate() {
                failures.extend(errors.into_iter().map(StopFailure::Terminate));
            }
        }

        self.transition(LifecycleState::Stopped);
        for failure in &failures {
            tracing::warn!(parent: &self.span, error = %failure, "Stop reported a failure");
        }
        StopError::from_failures(failures)
    }

    fn transition(&mut self, next: LifecycleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(parent: &self.span, from = %self.state, to = %next, "Lifecycle transition");
        metrics::record_transition(next);
        self.state = next;
    }
}
