//! Administrative API for the embedded service.
//!
//! | Method | Path                              | Success |
//! |--------|-----------------------------------|---------|
//! | POST   | `/pocketbase/superuser`           | 201     |
//! | PUT    | `/pocketbase/superuser`           | 200     |
//! | PATCH  | `/pocketbase/superuser`           | 200     |
//! | DELETE | `/pocketbase/superuser`           | 200     |
//! | POST   | `/pocketbase/superuser/{email}/otp` | 200   |
//!
//! The `/superuser` endpoints take `{"email_address": "...", "password": "..."}`
//! (`DELETE` only needs the email). Errors are plain text. The `superuser` and
//! `otp` segments match case-insensitively.

pub mod auth;
pub mod handlers;
pub mod response;

use axum::{
    extract::Request,
    http::uri::{PathAndQuery, Uri},
    middleware,
    routing::post,
    Router,
};
use std::sync::Arc;
use tower::Layer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::service::Service;

/// Path prefix owned by the admin API.
pub const ADMIN_PREFIX: &str = "/pocketbase/";

/// Shared state of the admin handlers. Holds a non-owning handle to the
/// service; the lifecycle adapter owns it.
#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<Service>,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(service: Arc<Service>, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    let routes = Router::new()
        .route(
            "/pocketbase/superuser",
            post(create_superuser)
                .put(upsert_superuser)
                .patch(update_superuser)
                .delete(delete_superuser)
                .fallback(method_not_allowed),
        )
        .route(
            "/pocketbase/superuser/{email}/otp",
            post(superuser_otp).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state);

    // Rewriting has to happen before routing, so it wraps the inner router.
    Router::new().fallback_service(middleware::map_request(fold_segment_case).layer(routes))
}

/// Lower-case the fixed `superuser` and `otp` segments; the email segment is
/// left as sent.
async fn fold_segment_case(mut request: Request) -> Request {
    let Some(path) = canonical_path(request.uri().path()) else {
        return request;
    };
    let rebuilt = match request.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };

    let mut parts = request.uri().clone().into_parts();
    let Ok(path_and_query) = PathAndQuery::try_from(rebuilt) else {
        return request;
    };
    parts.path_and_query = Some(path_and_query);
    if let Ok(uri) = Uri::from_parts(parts) {
        *request.uri_mut() = uri;
    }
    request
}

/// The path with its fixed segments folded, or `None` when nothing changes.
fn canonical_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = path.split('/').collect();
    let mut changed = false;

    if let ["", "pocketbase", resource, rest @ ..] = segments.as_mut_slice() {
        if *resource != "superuser" && resource.eq_ignore_ascii_case("superuser") {
            *resource = "superuser";
            changed = true;
        }
        if let [_, action] = rest {
            if *action != "otp" && action.eq_ignore_ascii_case("otp") {
                *action = "otp";
                changed = true;
            }
        }
    }

    changed.then(|| segments.join("/"))
}
