//! HTTP API of the embedded service.
//!
//! # Routes
//! - `GET  /api/health`
//! - `POST /api/collections/{collection}/auth-with-password`
//! - `POST /api/collections/{collection}/auth-with-otp`

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::records::unix_now;
use super::{Record, ServeEvent, Service, ServiceError};

/// Options for [`serve`].
#[derive(Debug, Clone, Default)]
pub struct ServeConfig {
    /// CORS origins; empty or containing `*` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Log the listening address once serving.
    pub show_start_banner: bool,
}

/// Build the service API, run serve hooks, publish the handler and serve
/// `listener` until `shutdown` resolves and open connections drain.
pub async fn serve<F>(
    service: Arc<Service>,
    listener: TcpListener,
    config: ServeConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    let event = ServeEvent { local_addr };

    let router = service
        .apply_serve_hooks(api_router(service.clone()), &event)
        .layer(cors_layer(&config.allowed_origins));

    if service.on_serve().publish(router.clone()).is_err() {
        tracing::warn!("Embedded handler was already published, keeping the first one");
    }

    if config.show_start_banner {
        tracing::info!(
            address = %local_addr,
            "Embedded server started at http://{}",
            local_addr
        );
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!(address = %local_addr, "Embedded server stopped");
    Ok(())
}

/// The service's own routes, without CORS.
pub fn api_router(service: Arc<Service>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/collections/{collection}/auth-with-password",
            post(auth_with_password),
        )
        .route(
            "/api/collections/{collection}/auth-with-otp",
            post(auth_with_otp),
        )
        .with_state(service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring unusable CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(values))
}

/// Error body in the service's `{code, message}` shape.
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.0.as_u16(),
            "message": self.1,
        });
        (self.0, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound(_) => ApiError(StatusCode::NOT_FOUND, e.to_string()),
            ServiceError::Validation(_) | ServiceError::Conflict(_) => {
                ApiError(StatusCode::BAD_REQUEST, e.to_string())
            }
            _ => {
                tracing::error!(error = %e, "Embedded service error");
                ApiError(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong while processing your request.".into(),
                )
            }
        }
    }
}

fn failed_auth() -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, "Failed to authenticate.".into())
}

#[derive(Debug, Serialize)]
struct RecordView {
    id: String,
    #[serde(rename = "collectionId")]
    collection_id: String,
    email: String,
}

impl From<&Record> for RecordView {
    fn from(r: &Record) -> Self {
        Self {
            id: r.id.clone(),
            collection_id: r.collection_id.clone(),
            email: r.email().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    record: RecordView,
}

#[derive(Debug, Deserialize)]
struct PasswordAuthRequest {
    identity: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct OtpAuthRequest {
    #[serde(rename = "otpId")]
    otp_id: String,
    password: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "code": 200,
        "message": "API is healthy.",
        "data": {},
    }))
}

async fn auth_with_password(
    State(service): State<Arc<Service>>,
    Path(collection): Path<String>,
    Json(req): Json<PasswordAuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let record = match service.find_auth_record_by_email(&collection, &req.identity) {
        Ok(r) => r,
        Err(ServiceError::NotFound(_)) => return Err(failed_auth()),
        Err(e) => return Err(e.into()),
    };

    if !record.validate_password(&req.password) {
        tracing::debug!(collection = %collection, "Password authentication rejected");
        return Err(failed_auth());
    }

    Ok(Json(AuthResponse {
        record: RecordView::from(&record),
    }))
}

async fn auth_with_otp(
    State(service): State<Arc<Service>>,
    Path(collection): Path<String>,
    Json(req): Json<OtpAuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let collection = service.find_collection(&collection)?;
    if !collection.otp.enabled {
        return Err(ApiError(
            StatusCode::FORBIDDEN,
            "The collection is not configured to allow OTP authentication.".into(),
        ));
    }

    let otp = match service.find_otp(&req.otp_id) {
        Ok(o) if o.collection_ref == collection.id => o,
        Ok(_) | Err(ServiceError::NotFound(_)) => return Err(failed_auth()),
        Err(e) => return Err(e.into()),
    };

    if otp.is_expired(collection.otp.duration_secs, unix_now())
        || !otp.validate_password(&req.password)
    {
        return Err(failed_auth());
    }

    let record = service.find_record(&otp.record_ref).map_err(|_| failed_auth())?;
    service.delete_otp(&otp)?;

    Ok(Json(AuthResponse {
        record: RecordView::from(&record),
    }))
}
