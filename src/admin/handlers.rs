//! Superuser account management.
//!
//! Every operation re-reads from the embedded service; nothing is cached.

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::admin::response::AdminError;
use crate::admin::AdminState;
use crate::observability::metrics;
use crate::service::validate::is_email;
use crate::service::{ServiceError, SUPERUSERS};

/// Body of the `/superuser` endpoints. `password` is ignored by `DELETE`.
#[derive(Debug, Default, Deserialize)]
pub struct SuperuserRequest {
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub password: String,
}

/// Decode the body and check the email, in that order.
fn parse_request(body: &[u8]) -> Result<SuperuserRequest, AdminError> {
    let req: SuperuserRequest = serde_json::from_slice(body)
        .map_err(|e| AdminError::Validation(format!("payload unintelligible: {}", e)))?;
    if !is_email(&req.email_address) {
        return Err(AdminError::invalid_email());
    }
    Ok(req)
}

fn observe(op: &'static str, result: Result<StatusCode, AdminError>) -> Result<StatusCode, AdminError> {
    let status = match &result {
        Ok(status) => *status,
        Err(e) => e.status(),
    };
    metrics::record_admin_request(op, status.as_u16());
    result
}

/// Password hashing is CPU-bound; keep it off the async workers.
async fn blocking<F>(f: F) -> Result<StatusCode, AdminError>
where
    F: FnOnce() -> Result<StatusCode, AdminError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(AdminError::Internal(format!("admin task failed: {}", e))))
}

fn fetch_collection_err(e: ServiceError) -> AdminError {
    AdminError::service(&format!("Failed to fetch {:?} collection", SUPERUSERS), e)
}

/// `POST /pocketbase/superuser`
pub async fn create_superuser(
    State(state): State<AdminState>,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    observe("create", blocking(move || create(&state, &body)).await)
}

fn create(state: &AdminState, body: &[u8]) -> Result<StatusCode, AdminError> {
    let req = parse_request(body)?;
    let collection = state
        .service
        .find_collection(SUPERUSERS)
        .map_err(fetch_collection_err)?;

    let mut superuser = state.service.new_record(&collection);
    superuser.set_email(&req.email_address);
    superuser
        .set_password(&req.password)
        .map_err(|e| AdminError::service("Invalid password", e))?;

    state
        .service
        .save(&superuser)
        .map_err(|e| AdminError::service("Failed to create new superuser account", e))?;

    tracing::info!(email = %superuser.email(), id = %superuser.id, "Superuser created");
    Ok(StatusCode::CREATED)
}

/// `PUT /pocketbase/superuser`
pub async fn upsert_superuser(
    State(state): State<AdminState>,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    observe("upsert", blocking(move || upsert(&state, &body)).await)
}

fn upsert(state: &AdminState, body: &[u8]) -> Result<StatusCode, AdminError> {
    let req = parse_request(body)?;
    let collection = state
        .service
        .find_collection(SUPERUSERS)
        .map_err(fetch_collection_err)?;

    let mut superuser = match state
        .service
        .find_auth_record_by_email(&collection.id, &req.email_address)
    {
        Ok(existing) => existing,
        Err(ServiceError::NotFound(_)) => state.service.new_record(&collection),
        Err(e) => return Err(AdminError::service("Failed to look up superuser", e)),
    };

    superuser.set_email(&req.email_address);
    superuser
        .set_password(&req.password)
        .map_err(|e| AdminError::service("Invalid password", e))?;

    state
        .service
        .save(&superuser)
        .map_err(|e| AdminError::service("Failed to upsert superuser account", e))?;

    tracing::info!(email = %superuser.email(), id = %superuser.id, "Superuser upserted");
    Ok(StatusCode::OK)
}

/// `PATCH /pocketbase/superuser`
pub async fn update_superuser(
    State(state): State<AdminState>,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    observe("update", blocking(move || update(&state, &body)).await)
}

fn update(state: &AdminState, body: &[u8]) -> Result<StatusCode, AdminError> {
    let req = parse_request(body)?;
    let mut superuser = match state
        .service
        .find_auth_record_by_email(SUPERUSERS, &req.email_address)
    {
        Ok(existing) => existing,
        Err(ServiceError::NotFound(_)) => {
            return Err(AdminError::NotFound(format!(
                "Superuser with email {:?} doesn't exist.",
                req.email_address
            )));
        }
        Err(e) => return Err(AdminError::service("Failed to look up superuser", e)),
    };

    superuser
        .set_password(&req.password)
        .map_err(|e| AdminError::service("Invalid password", e))?;

    state.service.save(&superuser).map_err(|e| {
        AdminError::service(
            &format!("Failed to change superuser {:?} password", superuser.email()),
            e,
        )
    })?;

    tracing::info!(email = %superuser.email(), "Superuser password changed");
    Ok(StatusCode::OK)
}

/// `DELETE /pocketbase/superuser`. Deleting an absent account succeeds.
pub async fn delete_superuser(
    State(state): State<AdminState>,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    observe("delete", blocking(move || delete(&state, &body)).await)
}

fn delete(state: &AdminState, body: &[u8]) -> Result<StatusCode, AdminError> {
    let req = parse_request(body)?;
    let superuser = match state
        .service
        .find_auth_record_by_email(SUPERUSERS, &req.email_address)
    {
        Ok(existing) => existing,
        Err(ServiceError::NotFound(_)) => {
            tracing::debug!(email = %req.email_address, "Superuser already absent");
            return Ok(StatusCode::OK);
        }
        Err(e) => return Err(AdminError::service("Failed to look up superuser", e)),
    };

    match state.service.delete(&superuser) {
        Ok(()) | Err(ServiceError::NotFound(_)) => {}
        Err(e) => {
            return Err(AdminError::service(
                &format!("Failed to delete superuser {:?}", superuser.email()),
                e,
            ));
        }
    }

    tracing::info!(email = %superuser.email(), "Superuser deleted");
    Ok(StatusCode::OK)
}

/// `POST /pocketbase/superuser/{email}/otp`
///
/// Stores a new one-time password for the account. The password itself is
/// not returned.
pub async fn superuser_otp(
    State(state): State<AdminState>,
    Path(email): Path<String>,
) -> Result<StatusCode, AdminError> {
    observe("otp", blocking(move || issue_otp(&state, &email)).await)
}

fn issue_otp(state: &AdminState, email: &str) -> Result<StatusCode, AdminError> {
    if email.is_empty() || !is_email(email) {
        return Err(AdminError::invalid_email());
    }

    let superuser = match state.service.find_auth_record_by_email(SUPERUSERS, email) {
        Ok(existing) => existing,
        Err(ServiceError::NotFound(_)) => {
            return Err(AdminError::NotFound(format!(
                "Superuser with email {:?} doesn't exist.",
                email
            )));
        }
        Err(e) => return Err(AdminError::service("Failed to look up superuser", e)),
    };

    let (otp, _) = state.service.issue_otp(&superuser).map_err(|e| {
        AdminError::service(&format!("Failed to issue OTP for {:?}", superuser.email()), e)
    })?;

    tracing::info!(
        email = %superuser.email(),
        otp_id = %otp.id,
        "Superuser OTP issued"
    );
    Ok(StatusCode::OK)
}

/// Fallback for paths outside the admin route table.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AdminError {
    metrics::record_admin_request("unknown", StatusCode::NOT_FOUND.as_u16());
    AdminError::NotFound(format!("resource not found: {}", uri.path()))
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed() -> AdminError {
    metrics::record_admin_request("unknown", StatusCode::METHOD_NOT_ALLOWED.as_u16());
    AdminError::MethodNotAllowed
}
