//! Pass-through to the embedded server's handler.
//!
//! Requests are dispatched in-process through the published router; nothing
//! is proxied over the loopback socket.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::ServiceExt;

use crate::admin::ADMIN_PREFIX;
use crate::observability::metrics;
use crate::service::Service;

/// Seconds suggested to clients that arrive before the handler is ready.
pub const RETRY_AFTER_SECS: u64 = 1;

/// Fallback handler of the public listener.
pub async fn forward(State(service): State<Arc<Service>>, request: Request) -> Response {
    let path = request.uri().path();
    if path.starts_with(ADMIN_PREFIX) || path == ADMIN_PREFIX.trim_end_matches('/') {
        metrics::record_forwarded(StatusCode::NOT_FOUND.as_u16());
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    let Some(handler) = service.on_serve().get() else {
        tracing::debug!(path = %path, "Embedded handler not ready");
        metrics::record_forwarded(StatusCode::SERVICE_UNAVAILABLE.as_u16());
        return unavailable();
    };

    let response = match handler.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    metrics::record_forwarded(response.status().as_u16());
    response
}

fn unavailable() -> Response {
    let mut response = Response::new(Body::from("embedded service is starting, retry shortly"));
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceSettings;
    use axum::{routing::get, Router};

    fn fixture() -> (tempfile::TempDir, Arc<Service>, Router) {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(Service::new(ServiceSettings {
            data_dir: dir.path().to_path_buf(),
        }));
        let router = Router::new().fallback(forward).with_state(service.clone());
        (dir, service, router)
    }

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unavailable_before_ready() {
        let (_dir, _service, router) = fixture();
        let res = router.oneshot(get_request("/api/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.headers()[header::RETRY_AFTER], "1");
    }

    #[tokio::test]
    async fn test_forwards_once_published() {
        let (_dir, service, router) = fixture();
        service
            .on_serve()
            .publish(Router::new().route("/hello", get(|| async { "hi" })))
            .unwrap();

        let res = router.clone().oneshot(get_request("/hello")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hi");

        let res = router.oneshot(get_request("/missing")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_prefix_not_forwarded() {
        let (_dir, service, router) = fixture();
        service
            .on_serve()
            .publish(Router::new().fallback(|| async { "embedded" }))
            .unwrap();

        let res = router
            .oneshot(get_request("/pocketbase/superuser"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
