//! Host HTTP listeners.
//!
//! # Responsibilities
//! - Build the public router (everything goes to the forwarder)
//! - Build the admin router under `/pocketbase/`
//! - Wire up middleware (tracing, limits, request ID, timeouts)
//! - Serve a listener until the shutdown future resolves

use axum::{http::HeaderName, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::HostConfig;
use crate::http::forward::forward;
use crate::service::Service;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Routers of the host process, built once the embedded service exists.
pub struct HostServer {
    public: Router,
    admin: Option<Router>,
}

impl HostServer {
    pub fn new(config: &HostConfig, service: Arc<Service>) -> Self {
        let public = Self::build_public_router(config, service.clone());
        let admin = config.admin.enabled.then(|| {
            let state = AdminState::new(service, config.admin.api_key.clone());
            Self::with_common_layers(setup_admin_router(state), config)
        });
        Self { public, admin }
    }

    fn build_public_router(config: &HostConfig, service: Arc<Service>) -> Router {
        let router = Router::new().fallback(forward).with_state(service);
        Self::with_common_layers(router, config)
    }

    /// Layers shared by both listeners. The request id is set before the
    /// trace span opens so it shows up in the span's headers.
    #[allow(deprecated)]
    fn with_common_layers(router: Router, config: &HostConfig) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        router
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub fn public_router(&self) -> Router {
        self.public.clone()
    }

    /// `None` when the admin API is disabled.
    pub fn admin_router(&self) -> Option<Router> {
        self.admin.clone()
    }
}

/// Serve `router` on `listener` until `shutdown` resolves and open
/// connections drain.
pub async fn run<F>(listener: TcpListener, router: Router, name: &'static str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, listener = name, "HTTP server starting");

    let app = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!(listener = name, "HTTP server stopped");
    Ok(())
}
